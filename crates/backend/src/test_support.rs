//! Helpers shared by the handler tests.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request},
    response::Response,
    Router,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use crate::auth::types::{AuthConfig, Claims};
use crate::config::AppConfig;
use crate::repository::MemoryUserStore;
use crate::session::Session;
use crate::{build_router, AppState};

pub const TEST_SESSION_SECRET: &str = "test-session-secret-0123456789abcdef";
pub const TEST_CLIENT_ID: &str = "votr-client";
pub const TEST_CLIENT_SECRET: &str = "votr-client-secret";

/// Request headers carrying the cookie from a `Set-Cookie` value.
pub fn request_headers(set_cookie: &str) -> HeaderMap {
    let pair = set_cookie.split(';').next().unwrap_or_default();
    let mut headers = HeaderMap::new();
    headers.insert(header::COOKIE, HeaderValue::from_str(pair).unwrap());
    headers
}

/// GET request, optionally sending the cookie from a `Set-Cookie` value.
pub fn get(uri: &str, set_cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(set_cookie) = set_cookie {
        let pair = set_cookie.split(';').next().unwrap_or_default();
        builder = builder.header(header::COOKIE, pair);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryUserStore>,
    router: Router,
}

impl TestApp {
    /// App backed by an in-memory store, talking to an identity provider at
    /// `idp_uri`.
    pub async fn new(idp_uri: &str) -> Self {
        let config = AppConfig {
            auth: AuthConfig {
                domain: idp_uri.to_string(),
                client_id: TEST_CLIENT_ID.to_string(),
                client_secret: TEST_CLIENT_SECRET.to_string(),
                callback_url: "http://localhost:3000/callback".to_string(),
                exchange_timeout: Duration::from_secs(2),
            },
            database_url: None,
            session_secret: TEST_SESSION_SECRET.to_string(),
            session_cookie_secure: false,
            rollbar_token: None,
            static_dir: "static".into(),
        };

        let store = Arc::new(MemoryUserStore::new());
        let state = AppState::new(&config, store.clone()).unwrap();
        let router = build_router(
            state.clone(),
            Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        );

        Self {
            state,
            store,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// `Set-Cookie` value of a verified, logged in session for `email`.
    pub async fn logged_in_cookie(&self, email: &str) -> String {
        let provisioned = self.state.users.provision(email).await.unwrap();
        let claims: Claims =
            serde_json::from_value(json!({"email": email, "email_verified": true})).unwrap();

        let mut session = Session::default();
        session.establish(&provisioned.user, claims, "test.id.token".to_string());

        let [(_, cookie)] = self.state.sessions.save(&session);
        cookie
    }
}
