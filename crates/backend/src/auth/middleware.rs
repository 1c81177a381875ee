//! Authentication middleware layer for protecting pages.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::session::SessionCodec;

use super::types::AuthUser;

/// Middleware that requires a logged in session.
///
/// Anonymous visitors are sent through `/login` and come back to the page
/// they asked for. Use with `axum::middleware::from_fn_with_state`.
pub async fn require_session(
    State(sessions): State<SessionCodec>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session = sessions.load(request.headers());

    let user = match (&session.email, &session.client_id) {
        (Some(email), Some(client_id)) if session.is_authenticated() => AuthUser {
            email: email.clone(),
            client_id: client_id.clone(),
        },
        _ => {
            let target = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or("/");
            return Redirect::to(&format!("/login?next={}", urlencoding::encode(target)))
                .into_response();
        }
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}
