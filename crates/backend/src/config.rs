use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::types::AuthConfig;

/// Minimum length of the master key the session cookie keys are derived from.
pub const MIN_SESSION_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    /// Postgres URL; optional so the server can run on the in-memory store
    pub database_url: Option<String>,
    pub session_secret: String,
    pub session_cookie_secure: bool,
    /// Rollbar access token; error reporting is disabled without one
    pub rollbar_token: Option<String>,
    pub static_dir: PathBuf,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// Required env vars:
    /// - `AUTH0_DOMAIN`, `AUTH0_CLIENT_ID`, `AUTH0_CLIENT_SECRET`, `AUTH0_CALLBACK_URL`
    /// - `SESSION_SECRET`: at least 32 bytes
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| var(key).context(format!("{} must be set", key));

        let exchange_timeout_secs = match var("TOKEN_EXCHANGE_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("TOKEN_EXCHANGE_TIMEOUT_SECS must be a number of seconds")?,
            None => 10,
        };

        let auth = AuthConfig {
            domain: require("AUTH0_DOMAIN")?,
            client_id: require("AUTH0_CLIENT_ID")?,
            client_secret: require("AUTH0_CLIENT_SECRET")?,
            callback_url: require("AUTH0_CALLBACK_URL")?,
            exchange_timeout: Duration::from_secs(exchange_timeout_secs),
        };

        let session_secret = require("SESSION_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            bail!(
                "SESSION_SECRET must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            );
        }

        Ok(Self {
            auth,
            database_url: var("DATABASE_URL"),
            session_secret,
            session_cookie_secure: var("SESSION_COOKIE_SECURE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            rollbar_token: var("ROLLBAR_TOKEN").filter(|t| !t.trim().is_empty()),
            static_dir: PathBuf::from(var("STATIC_DIR").unwrap_or_else(|| "static".to_string())),
        })
    }
}
