//! Auth-related types and configuration.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

// Re-export shared types for convenience
pub use shared_types::SessionUserResponse;

/// Identity provider settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Provider domain, e.g. `votr.auth0.com`. A full `http(s)://` origin is
    /// accepted as well.
    pub domain: String,
    pub client_id: String,
    /// Used both for the code exchange and as the HS256 key of identity tokens
    pub client_secret: String,
    pub callback_url: String,
    pub exchange_timeout: Duration,
}

impl AuthConfig {
    /// Origin of the identity provider without trailing slash.
    pub fn base_url(&self) -> String {
        let domain = self.domain.trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base_url())
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/authorize", self.base_url())
    }
}

/// Logged in user, attached to requests by `require_session`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub client_id: String,
}

/// Linked account entry of an identity token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub provider: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Claims decoded from an identity token.
///
/// Only the fields the login flow inspects are typed; everything else the
/// provider sends is kept in `extra` so the full payload can live in the
/// session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<Identity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Non-empty email claim, if any.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.trim().is_empty())
    }

    pub fn is_email_verified(&self) -> bool {
        self.email_verified.unwrap_or(false)
    }

    /// Display name of the social provider the user signed in with.
    pub fn provider_name(&self) -> String {
        match self.identities.first() {
            Some(identity) => capitalize(&identity.provider),
            None => "your identity provider".to_string(),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Token endpoint response. Only the identity token is used; the access
/// token and its lifetime are ignored.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub id_token: Option<String>,
}
