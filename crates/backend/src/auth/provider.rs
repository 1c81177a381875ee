//! Identity provider HTTP client.

use serde::Serialize;

use crate::error::AuthError;

use super::types::{AuthConfig, TokenResponse};

/// Scopes requested at login; `email` is what the callback needs.
const LOGIN_SCOPES: &str = "openid profile email";

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    code: &'a str,
    grant_type: &'a str,
}

/// Talks to the provider's OAuth endpoints.
#[derive(Clone)]
pub struct IdentityProvider {
    config: AuthConfig,
    http: reqwest::Client,
}

impl IdentityProvider {
    pub fn new(config: AuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.exchange_timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// URL that starts a login; `state` comes back untouched on the callback.
    pub fn authorize_url(&self, state: Option<&str>) -> String {
        let mut url = format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}",
            self.config.authorize_endpoint(),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.callback_url),
            urlencoding::encode(LOGIN_SCOPES),
        );
        if let Some(state) = state {
            url.push_str("&state=");
            url.push_str(&urlencoding::encode(state));
        }
        url
    }

    /// Exchange an authorization code for the identity token.
    ///
    /// Makes exactly one attempt: codes are single use, so a retry after an
    /// ambiguous failure could never succeed.
    pub async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let response = self
            .http
            .post(self.config.token_url())
            .json(&TokenRequest {
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
                redirect_uri: &self.config.callback_url,
                code,
                grant_type: "authorization_code",
            })
            .send()
            .await
            .map_err(AuthError::Exchange)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Token exchange failed: {} - {}", status, body);
            return Err(AuthError::ProviderRejected { status, body });
        }

        let tokens: TokenResponse = response.json().await.map_err(AuthError::Exchange)?;

        tokens
            .id_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingIdToken)
    }
}
