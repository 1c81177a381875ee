//! Authentication HTTP handlers.

use axum::{
    extract::{Query, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Deserialize;
use shared_types::Flash;

use crate::error::{ApiError, ApiResult, AuthError};
use crate::handlers::render;
use crate::pages;
use crate::reporting::Level;
use crate::session::Session;
use crate::AppState;

use super::{jwt, types::SessionUserResponse};

const DEFAULT_LANDING: &str = "/dashboard";

/// Accept only same-site paths as post-login targets.
///
/// Browsers strip tabs and newlines from URLs, so `/\t/host` behaves like
/// `//host`. Control characters and whitespace are rejected, and the rest
/// must parse as a bare path that is valid in a `Location` header.
fn local_path(target: &str) -> Option<&str> {
    if !target.starts_with('/') || target.starts_with("//") || target.contains('\\') {
        return None;
    }
    if target.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return None;
    }
    let uri: Uri = target.parse().ok()?;
    (uri.scheme().is_none() && uri.authority().is_none()).then_some(target)
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    pub next: Option<String>,
}

/// Start the login flow at the identity provider.
///
/// `next` travels as the OAuth `state` and is where the callback sends the
/// user afterwards.
pub async fn login(State(state): State<AppState>, Query(params): Query<LoginParams>) -> Redirect {
    let next = params.next.as_deref().and_then(local_path);
    Redirect::to(&state.identity.authorize_url(next))
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// Handle the identity provider callback.
///
/// Exchanges the authorization code for tokens, validates the identity
/// token, provisions the local user and stores the login in the session.
/// Every failure ends on the home page with an error flash.
pub async fn callback(
    State(state): State<AppState>,
    mut session: Session,
    Query(params): Query<CallbackParams>,
) -> Response {
    match handle_callback_inner(&state, &mut session, params).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Auth callback error: {}", e);
            if e.is_server_fault() {
                state
                    .reporter
                    .report(Level::Error, format!("login callback failed: {}", e));
            }
            if matches!(e, AuthError::InvalidToken(_)) {
                session.clear();
            }
            session.flash(Flash::error(e.user_message()));
            (state.sessions.save(&session), Redirect::to("/")).into_response()
        }
    }
}

async fn handle_callback_inner(
    state: &AppState,
    session: &mut Session,
    params: CallbackParams,
) -> Result<Response, AuthError> {
    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCode)?;

    let id_token = state.identity.exchange_code(&code).await?;
    let claims = jwt::decode_id_token(state.identity.config(), &id_token)?;

    let Some(email) = claims.email().map(str::to_string) else {
        tracing::warn!("Identity token for {:?} carried no email", claims.sub);
        session.clear();
        session.flash(Flash::error(format!(
            "We could not get your email address from {}. \
             Please create an Email/Password account or try another social signup.",
            claims.provider_name()
        )));
        return Ok(render(&state.sessions, std::mem::take(session), pages::home));
    };

    tracing::info!("Login from: {}", email);

    let provisioned = state.users.provision(&email).await?;
    let verified = claims.is_email_verified();
    session.establish(&provisioned.user, claims, id_token);

    if !verified {
        session.flash(Flash::success(format!(
            "We just sent a verification email to {}",
            email
        )));
        return Ok((state.sessions.save(session), Redirect::to("/")).into_response());
    }

    let target = params
        .state
        .as_deref()
        .and_then(local_path)
        .unwrap_or(DEFAULT_LANDING);

    tracing::info!("Successful login for: {}", email);
    Ok((state.sessions.save(session), Redirect::to(target)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LogoutParams {
    pub message: Option<String>,
    pub success: Option<String>,
}

/// Clear the session and return home.
///
/// The identity provider also redirects here after email verification,
/// passing `message` and `success`.
pub async fn logout(
    State(state): State<AppState>,
    mut session: Session,
    Query(params): Query<LogoutParams>,
) -> impl IntoResponse {
    let was_logged_in = session.is_authenticated();
    session.clear();

    if was_logged_in {
        session.flash(Flash::success(
            "Thanks for using Votr!, We hope to see you soon",
        ));
    }

    let message = params.message.as_deref().unwrap_or("Not verified");
    let success = params.success.as_deref().is_some_and(|s| !s.is_empty());
    if success && message.to_lowercase().contains("your email was verified") {
        session.flash(Flash::success(
            "Your email has been verified. You can login now",
        ));
    }

    (state.sessions.save(&session), Redirect::to("/"))
}

/// Get the logged in user.
pub async fn me(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<SessionUserResponse>> {
    let (Some(email), Some(profile)) = (session.email.as_deref(), session.profile.as_ref()) else {
        return Err(ApiError::Unauthorized("Not logged in".to_string()));
    };

    let user = state
        .users
        .find(email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    Ok(Json(SessionUserResponse {
        email: user.email,
        client_id: user.client_id,
        email_verified: profile.is_email_verified(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{body_text, get, request_headers, TestApp, TEST_CLIENT_ID};
    use axum::http::StatusCode;
    use chrono::{Duration as ChronoDuration, Utc};
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn id_token(secret: &str, extra: Value) -> String {
        let mut claims = json!({
            "aud": TEST_CLIENT_ID,
            "sub": "auth0|1",
            "exp": (Utc::now() + ChronoDuration::hours(1)).timestamp(),
        });
        if let (Some(base), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        jwt::sign_test_token(secret, &claims)
    }

    async fn provider_returning(token: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_token": token,
                "access_token": "at"
            })))
            .mount(&server)
            .await;
        server
    }

    fn location(response: &Response) -> String {
        response
            .headers()
            .get("location")
            .expect("redirect location")
            .to_str()
            .unwrap()
            .to_string()
    }

    fn session_after(app: &TestApp, response: &Response) -> Session {
        match response.headers().get("set-cookie") {
            Some(value) => app
                .state
                .sessions
                .load(&request_headers(value.to_str().unwrap())),
            None => Session::default(),
        }
    }

    #[tokio::test]
    async fn test_verified_login_follows_state() {
        let token = id_token(
            crate::test_support::TEST_CLIENT_SECRET,
            json!({"email": "ada@example.com", "email_verified": true}),
        );
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;

        let response = app
            .send(get("/callback?code=abc&state=%2Fpolls%2F42", None))
            .await;

        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/polls/42");

        let session = session_after(&app, &response);
        assert!(session.is_authenticated());
        assert_eq!(session.email.as_deref(), Some("ada@example.com"));
        assert_eq!(session.id_token.as_deref(), Some(token.as_str()));

        let user = app
            .state
            .users
            .find("ada@example.com")
            .await
            .unwrap()
            .expect("user created");
        assert_eq!(session.client_id, Some(user.client_id));
    }

    #[tokio::test]
    async fn test_verified_login_without_state_goes_to_dashboard() {
        let token = id_token(
            crate::test_support::TEST_CLIENT_SECRET,
            json!({"email": "ada@example.com", "email_verified": true}),
        );
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;

        let response = app.send(get("/callback?code=abc", None)).await;
        assert_eq!(location(&response), "/dashboard");
    }

    #[tokio::test]
    async fn test_external_state_is_ignored() {
        let token = id_token(
            crate::test_support::TEST_CLIENT_SECRET,
            json!({"email": "ada@example.com", "email_verified": true}),
        );
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;

        let response = app
            .send(get("/callback?code=abc&state=https%3A%2F%2Fevil.example", None))
            .await;
        assert_eq!(location(&response), "/dashboard");

        let response = app
            .send(get("/callback?code=abc&state=%2F%2Fevil.example", None))
            .await;
        assert_eq!(location(&response), "/dashboard");
    }

    #[tokio::test]
    async fn test_unverified_login_goes_home_with_reminder() {
        let token = id_token(
            crate::test_support::TEST_CLIENT_SECRET,
            json!({"email": "new@example.com", "email_verified": false}),
        );
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;

        let response = app
            .send(get("/callback?code=abc&state=%2Fpolls%2F42", None))
            .await;
        assert_eq!(location(&response), "/");

        let session = session_after(&app, &response);
        assert!(session.is_authenticated());
        assert_eq!(
            session.flashes,
            vec![Flash::success(
                "We just sent a verification email to new@example.com"
            )]
        );
    }

    #[tokio::test]
    async fn test_missing_email_creates_nothing() {
        let token = id_token(
            crate::test_support::TEST_CLIENT_SECRET,
            json!({"identities": [{"provider": "twitter"}]}),
        );
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;

        let response = app.send(get("/callback?code=abc", None)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let session = session_after(&app, &response);
        assert!(!session.is_authenticated());
        assert!(app.store.is_empty());

        let body = body_text(response).await;
        assert!(body.contains("We could not get your email address from Twitter."));
        assert!(body.contains("flash-error"));
    }

    #[tokio::test]
    async fn test_repeat_login_reuses_client_id() {
        let token = id_token(
            crate::test_support::TEST_CLIENT_SECRET,
            json!({"email": "ada@example.com", "email_verified": true}),
        );
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;

        let first = app.send(get("/callback?code=one", None)).await;
        let second = app.send(get("/callback?code=two", None)).await;

        assert_eq!(
            session_after(&app, &first).client_id,
            session_after(&app, &second).client_id
        );
        assert_eq!(app.store.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_secret_rejects_login() {
        let token = id_token(
            "not-the-client-secret",
            json!({"email": "ada@example.com", "email_verified": true}),
        );
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;

        let response = app.send(get("/callback?code=abc", None)).await;
        assert_eq!(location(&response), "/");

        let session = session_after(&app, &response);
        assert!(!session.is_authenticated());
        assert!(session.client_id.is_none());
        assert!(session.id_token.is_none());
        assert_eq!(session.flashes.len(), 1);
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_secret_discards_existing_login() {
        let token = id_token("not-the-client-secret", json!({"email": "mallory@example.com"}));
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;
        let cookie = app.logged_in_cookie("ada@example.com").await;

        let response = app.send(get("/callback?code=abc", Some(cookie.as_str()))).await;
        assert!(!session_after(&app, &response).is_authenticated());
    }

    #[tokio::test]
    async fn test_provider_failure_flashes_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let app = TestApp::new(&server.uri()).await;

        let response = app.send(get("/callback?code=abc", None)).await;
        assert_eq!(location(&response), "/");

        let session = session_after(&app, &response);
        assert!(!session.is_authenticated());
        assert_eq!(session.flashes[0].kind, shared_types::FlashKind::Error);
    }

    #[tokio::test]
    async fn test_missing_code_flashes_error() {
        let app = TestApp::new("http://127.0.0.1:9").await;

        let response = app.send(get("/callback", None)).await;
        assert_eq!(location(&response), "/");
        assert_eq!(session_after(&app, &response).flashes.len(), 1);
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let app = TestApp::new("http://127.0.0.1:9").await;
        let cookie = app.logged_in_cookie("ada@example.com").await;

        let response = app.send(get("/logout", Some(cookie.as_str()))).await;
        assert_eq!(location(&response), "/");

        let session = session_after(&app, &response);
        assert!(!session.is_authenticated());
        assert!(session.email.is_none());
        assert!(session.profile.is_none());
        assert_eq!(
            session.flashes,
            vec![Flash::success(
                "Thanks for using Votr!, We hope to see you soon"
            )]
        );
    }

    #[tokio::test]
    async fn test_logout_after_verification() {
        let app = TestApp::new("http://127.0.0.1:9").await;

        let response = app
            .send(get(
                "/logout?message=Your%20email%20was%20verified.%20You%20can%20continue&success=true",
                None,
            ))
            .await;
        assert_eq!(location(&response), "/");
        assert_eq!(
            session_after(&app, &response).flashes,
            vec![Flash::success(
                "Your email has been verified. You can login now"
            )]
        );
    }

    #[tokio::test]
    async fn test_logout_anonymous_is_quiet() {
        let app = TestApp::new("http://127.0.0.1:9").await;

        let response = app.send(get("/logout", None)).await;
        assert_eq!(location(&response), "/");
        assert!(session_after(&app, &response).is_empty());
    }

    #[tokio::test]
    async fn test_login_redirects_to_provider() {
        let app = TestApp::new("https://votr.auth0.com").await;

        let response = app.send(get("/login?next=%2Fpolls%2F7", None)).await;
        let target = location(&response);
        assert!(target.starts_with("https://votr.auth0.com/authorize?response_type=code"));
        assert!(target.ends_with("&state=%2Fpolls%2F7"));
    }

    #[tokio::test]
    async fn test_me_requires_session() {
        let app = TestApp::new("http://127.0.0.1:9").await;

        let response = app.send(get("/api/me", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let cookie = app.logged_in_cookie("ada@example.com").await;
        let response = app.send(get("/api/me", Some(cookie.as_str()))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["email_verified"], true);
    }

    #[tokio::test]
    async fn test_state_with_control_characters_is_ignored() {
        let token = id_token(
            crate::test_support::TEST_CLIENT_SECRET,
            json!({"email": "ada@example.com", "email_verified": true}),
        );
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;

        for state in ["%2F%09%2Fevil.example", "%2Fpolls%0Ax", "%2Fpolls%2F%C3%A9"] {
            let response = app
                .send(get(&format!("/callback?code=abc&state={}", state), None))
                .await;

            assert!(response.status().is_redirection(), "state {}", state);
            assert_eq!(location(&response), "/dashboard");
            assert!(session_after(&app, &response).is_authenticated());
        }
    }

    #[tokio::test]
    async fn test_login_drops_unsafe_next() {
        let app = TestApp::new("https://votr.auth0.com").await;

        let response = app
            .send(get("/login?next=%2F%09%2Fevil.example", None))
            .await;
        assert!(!location(&response).contains("state="));
    }

    #[tokio::test]
    async fn test_missing_email_logs_out_existing_session() {
        let token = id_token(crate::test_support::TEST_CLIENT_SECRET, json!({}));
        let server = provider_returning(&token).await;
        let app = TestApp::new(&server.uri()).await;
        let cookie = app.logged_in_cookie("ada@example.com").await;

        let response = app.send(get("/callback?code=abc", Some(cookie.as_str()))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let session = session_after(&app, &response);
        assert!(!session.is_authenticated());
        assert!(session.email.is_none());
        assert!(body_text(response).await.contains("your identity provider"));
    }

    #[test]
    fn test_local_path() {
        assert_eq!(local_path("/polls/42"), Some("/polls/42"));
        assert_eq!(local_path("/polls/42?tab=results"), Some("/polls/42?tab=results"));
        assert_eq!(local_path("//evil.example"), None);
        assert_eq!(local_path("https://evil.example"), None);
        assert_eq!(local_path("/\\evil.example"), None);
        assert_eq!(local_path("/\t/evil.example"), None);
        assert_eq!(local_path("/polls\nSet-Cookie: x=1"), None);
        assert_eq!(local_path("/polls/ 42"), None);
        assert_eq!(local_path("/polls/\u{e9}"), None);
    }
}
