//! Votr web server: identity-provider login, sessions, and poll pages.

use axum::{
    extract::FromRef,
    middleware,
    routing::get,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::{catch_panic::CatchPanicLayer, services::ServeDir, trace::TraceLayer};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
mod handlers;
mod models;
mod pages;
pub mod reporting;
pub mod repository;
mod schema;
pub mod services;
pub mod session;

#[cfg(test)]
mod test_support;

use auth::IdentityProvider;
use config::AppConfig;
use reporting::ErrorReporter;
use repository::UserStore;
use services::UserProvisioner;
use session::SessionCodec;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityProvider,
    pub sessions: SessionCodec,
    pub users: UserProvisioner,
    pub reporter: ErrorReporter,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        Ok(Self {
            identity: IdentityProvider::new(config.auth.clone())?,
            sessions: SessionCodec::new(&config.session_secret, config.session_cookie_secure)?,
            users: UserProvisioner::new(store),
            reporter: ErrorReporter::from_token(config.rollbar_token.as_deref())?,
        })
    }
}

impl FromRef<AppState> for SessionCodec {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for ErrorReporter {
    fn from_ref(state: &AppState) -> Self {
        state.reporter.clone()
    }
}

pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    let protected = Router::new()
        .route("/dashboard", get(handlers::dashboard))
        .route_layer(middleware::from_fn_with_state(
            state.sessions.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health_check))
        // Auth routes
        .route("/login", get(auth::login))
        .route("/callback", get(auth::callback))
        .route("/logout", get(auth::logout))
        .route("/api/me", get(auth::me))
        // Poll pages
        .route("/new_poll", get(handlers::new_poll))
        .route("/polls/:unique_id", get(handlers::poll))
        .route("/embed/:unique_id", get(handlers::embed))
        .merge(protected)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(CatchPanicLayer::custom(reporting::panic_response))
        .layer(middleware::from_fn_with_state(
            state.reporter.clone(),
            reporting::report_server_errors,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
