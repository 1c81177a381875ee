use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::auth::AuthUser;
use crate::pages::{self, PageContext};
use crate::session::{Session, SessionCodec};
use crate::AppState;

/// Render a page, consuming the session's pending flashes.
///
/// The session cookie is only rewritten when flashes were shown.
pub fn render(
    sessions: &SessionCodec,
    mut session: Session,
    page: impl FnOnce(&PageContext<'_>) -> String,
) -> Response {
    let flashes = session.take_flashes();
    let email = session
        .email
        .as_deref()
        .filter(|_| session.is_authenticated());

    let html = Html(page(&PageContext {
        flashes: &flashes,
        email,
    }));

    if flashes.is_empty() {
        html.into_response()
    } else {
        (sessions.save(&session), html).into_response()
    }
}

pub async fn home(State(state): State<AppState>, session: Session) -> Response {
    render(&state.sessions, session, pages::home)
}

pub async fn new_poll(State(state): State<AppState>, session: Session) -> Response {
    render(&state.sessions, session, pages::new_poll)
}

pub async fn poll(
    State(state): State<AppState>,
    session: Session,
    Path(unique_id): Path<String>,
) -> Response {
    render(&state.sessions, session, |ctx| pages::poll(ctx, &unique_id))
}

pub async fn embed(Path(unique_id): Path<String>) -> Html<String> {
    Html(pages::embed(&unique_id))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    session: Session,
) -> Response {
    tracing::debug!("Dashboard for {}", user.email);
    render(&state.sessions, session, pages::dashboard)
}

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
