//! Authentication module for the identity-provider login flow.
//!
//! This module provides:
//! - identity token validation
//! - the authorization-code exchange with the identity provider
//! - `/login`, `/callback`, `/logout` and `/api/me` handlers
//! - `require_session` middleware for pages that need a logged in user

mod handlers;
pub mod jwt;
mod middleware;
pub mod provider;
pub mod types;

pub use handlers::{callback, login, logout, me};
pub use middleware::require_session;
pub use provider::IdentityProvider;
pub use types::AuthUser;
