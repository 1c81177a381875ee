//! Forwarding of server errors to Rollbar.

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

pub const ROLLBAR_ITEM_URL: &str = "https://api.rollbar.com/api/1/item/";

const ENVIRONMENT: &str = "votr";

/// Upper bound for one report so a stalled endpoint cannot pin background tasks.
pub const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Critical,
}

impl Level {
    pub fn as_str(&self) -> &str {
        match self {
            Level::Error => "error",
            Level::Critical => "critical",
        }
    }
}

struct Rollbar {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

/// Sends error items to Rollbar; a no-op when no access token is configured.
#[derive(Clone)]
pub struct ErrorReporter {
    rollbar: Option<Arc<Rollbar>>,
}

impl ErrorReporter {
    pub fn disabled() -> Self {
        Self { rollbar: None }
    }

    pub fn rollbar(
        token: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            rollbar: Some(Arc::new(Rollbar {
                http,
                endpoint: endpoint.into(),
                token: token.into(),
            })),
        })
    }

    /// Reporter for an optional token, pointed at the public Rollbar API.
    pub fn from_token(token: Option<&str>) -> anyhow::Result<Self> {
        match token {
            Some(token) => Self::rollbar(token, ROLLBAR_ITEM_URL, REPORT_TIMEOUT),
            None => {
                tracing::warn!("ROLLBAR_TOKEN not set, error reporting disabled");
                Ok(Self::disabled())
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.rollbar.is_some()
    }

    /// Report in the background without delaying the caller.
    pub fn report(&self, level: Level, message: String) {
        if !self.is_enabled() {
            return;
        }
        let reporter = self.clone();
        tokio::spawn(async move {
            if let Err(e) = reporter.send(level, &message).await {
                tracing::warn!("Failed to report error to Rollbar: {:?}", e);
            }
        });
    }

    pub async fn send(&self, level: Level, message: &str) -> anyhow::Result<()> {
        let Some(rollbar) = &self.rollbar else {
            return Ok(());
        };

        let payload = json!({
            "data": {
                "environment": ENVIRONMENT,
                "level": level.as_str(),
                "language": "rust",
                "framework": "axum",
                "body": { "message": { "body": message } },
            }
        });

        rollbar
            .http
            .post(&rollbar.endpoint)
            .header("X-Rollbar-Access-Token", &rollbar.token)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// Panic payload carried from the panic handler to [`report_server_errors`].
#[derive(Debug, Clone)]
struct PanicMessage(String);

/// Response for a handler panic, used with `CatchPanicLayer::custom`.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    tracing::error!("Handler panicked: {}", message);

    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
    response.extensions_mut().insert(PanicMessage(message));
    response
}

/// Middleware reporting every 5xx response.
pub async fn report_server_errors(
    State(reporter): State<ErrorReporter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    if response.status().is_server_error() {
        match response.extensions().get::<PanicMessage>() {
            Some(PanicMessage(panic)) => reporter.report(
                Level::Critical,
                format!("panic in {} {}: {}", method, uri.path(), panic),
            ),
            None => reporter.report(
                Level::Error,
                format!("{} {} returned {}", method, uri.path(), response.status()),
            ),
        }
    }

    response
}
