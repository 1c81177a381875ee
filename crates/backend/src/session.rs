//! Per-browser session state.
//!
//! The session is an explicit value: handlers extract a [`Session`], change
//! it, and hand it back to [`SessionCodec::save`] to produce the
//! `Set-Cookie` header. The payload is JSON sealed in an encrypted,
//! authenticated cookie, so the browser can neither read nor forge it.

use anyhow::bail;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap, HeaderName},
};
use cookie::{Cookie, CookieJar, Key, SameSite};
use serde::{Deserialize, Serialize};
use shared_types::{Flash, User};
use std::convert::Infallible;

use crate::auth::types::Claims;
use crate::config::MIN_SESSION_SECRET_LEN;

pub const SESSION_COOKIE_NAME: &str = "votr_session";

/// Browsers drop cookies above this size.
const MAX_COOKIE_BYTES: usize = 4096;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Full identity claims of the logged in user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Claims>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flashes: Vec<Flash>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.client_id.is_some() && self.profile.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Session::default()
    }

    /// Record a successful login.
    pub fn establish(&mut self, user: &User, claims: Claims, id_token: String) {
        self.client_id = Some(user.client_id.clone());
        self.email = Some(user.email.clone());
        self.profile = Some(claims);
        self.id_token = Some(id_token);
    }

    /// Drop everything, pending flashes included.
    pub fn clear(&mut self) {
        *self = Session::default();
    }

    pub fn flash(&mut self, flash: Flash) {
        self.flashes.push(flash);
    }

    pub fn take_flashes(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.flashes)
    }
}

/// Seals sessions into cookies and opens them again.
#[derive(Clone)]
pub struct SessionCodec {
    key: Key,
    secure: bool,
}

impl SessionCodec {
    pub fn new(secret: &str, secure: bool) -> anyhow::Result<Self> {
        if secret.len() < MIN_SESSION_SECRET_LEN {
            bail!(
                "session secret must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            );
        }
        Ok(Self {
            key: Key::derive_from(secret.as_bytes()),
            secure,
        })
    }

    /// Read the session from request headers.
    ///
    /// A missing, tampered, or undecodable cookie yields an empty session.
    pub fn load(&self, headers: &HeaderMap) -> Session {
        let mut jar = CookieJar::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie_str in value.split(';') {
                if let Ok(cookie) = Cookie::parse(cookie_str.trim().to_string()) {
                    jar.add_original(cookie);
                }
            }
        }

        let Some(cookie) = jar.private(&self.key).get(SESSION_COOKIE_NAME) else {
            if jar.get(SESSION_COOKIE_NAME).is_some() {
                tracing::debug!("Discarding session cookie that failed to decrypt");
            }
            return Session::default();
        };

        match serde_json::from_str(cookie.value()) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Discarding unreadable session payload: {}", e);
                Session::default()
            }
        }
    }

    /// Build the `Set-Cookie` header persisting `session`.
    ///
    /// An empty session expires the cookie instead.
    pub fn save(&self, session: &Session) -> [(HeaderName, String); 1] {
        if session.is_empty() {
            return [(header::SET_COOKIE, self.removal())];
        }

        let payload = match serde_json::to_string(session) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode session: {}", e);
                return [(header::SET_COOKIE, self.removal())];
            }
        };

        let mut jar = CookieJar::new();
        jar.private_mut(&self.key).add(self.base_cookie(payload));

        let sealed = jar
            .get(SESSION_COOKIE_NAME)
            .map(|c| c.to_string())
            .unwrap_or_else(|| self.removal());

        if sealed.len() > MAX_COOKIE_BYTES {
            tracing::warn!(
                "Session cookie is {} bytes, browsers may drop it",
                sealed.len()
            );
        }

        [(header::SET_COOKIE, sealed)]
    }

    fn base_cookie(&self, value: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE_NAME, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }

    fn removal(&self) -> String {
        let mut cookie = self.base_cookie(String::new());
        cookie.make_removal();
        cookie.to_string()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    SessionCodec: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let codec = SessionCodec::from_ref(state);
        Ok(codec.load(&parts.headers))
    }
}
