//! Unified error handling for the web server.
//!
//! `ApiError` implements `IntoResponse` so handlers can use `?` naturally.
//! `AuthError` covers the login handshake, which is recovered at page level
//! instead of turning into an error status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Unified error type for handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Storage or other internal failure
    #[error("{0}")]
    Internal(#[from] anyhow::Error),

    /// Authentication required but not provided or invalid
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        };

        let body = Json(ErrorResponse {
            error: error_message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures of the login handshake.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("callback is missing the authorization code")]
    MissingCode,

    /// Transport failure or timeout talking to the identity provider
    #[error("token exchange failed: {0}")]
    Exchange(#[source] reqwest::Error),

    #[error("identity provider rejected the code exchange with {status}: {body}")]
    ProviderRejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("token response did not contain an id_token")]
    MissingIdToken,

    #[error("identity token rejected: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("user provisioning failed: {0}")]
    Storage(#[from] anyhow::Error),
}

impl AuthError {
    /// Message shown to the user as an error flash.
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::MissingCode
            | AuthError::Exchange(_)
            | AuthError::ProviderRejected { .. }
            | AuthError::MissingIdToken => {
                "We could not complete your login with the identity provider. Please try again."
            }
            AuthError::InvalidToken(_) => "We could not verify your login. Please try again.",
            AuthError::Storage(_) => "Something went wrong while logging you in. Please try again.",
        }
    }

    /// Whether the failure should be forwarded to error tracking.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, AuthError::Storage(_))
    }
}
