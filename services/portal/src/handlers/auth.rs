//! Sign-in handlers (login, callback, logout)

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse, Redirect, Response};
use rolegate_auth_core::{AuthError, CallbackParams, PendingLogin, SessionPayload};

use crate::extractors::{clear_cookie, cookie_value, set_cookie, LOGIN_COOKIE, SESSION_COOKIE};
use crate::state::AppState;
use crate::views;

/// GET /auth/login
///
/// Start a sign-in and send the browser to the identity provider
pub async fn login(State(state): State<AppState>) -> Response {
    let redirect = state.authenticator.begin_login();

    let sealed = match state.codec.seal(&redirect.pending) {
        Ok(sealed) => sealed,
        Err(e) => return login_failure(&state, e),
    };
    let cookie = set_cookie(
        LOGIN_COOKIE,
        &sealed,
        state.config.auth.login_timeout.as_secs(),
        state.secure_cookies(),
    );

    (
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Redirect::to(&redirect.url),
    )
        .into_response()
}

/// GET /auth/callback
///
/// Complete the sign-in, register a session and go to the portal
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Response {
    // An unreadable or expired login cookie is the same as none
    let pending: Option<PendingLogin> = cookie_value(&headers, LOGIN_COOKIE)
        .and_then(|cookie| state.codec.open(cookie).ok());

    let principal = match state.authenticator.authenticate(&params, pending.as_ref()).await {
        Ok(principal) => principal,
        Err(e) => return login_failure(&state, e),
    };

    let session_duration = state.config.auth.session_duration;
    let payload = SessionPayload::new(&principal, session_duration);
    let sealed = match state.codec.seal(&payload) {
        Ok(sealed) => sealed,
        Err(e) => return login_failure(&state, e),
    };
    state.sessions.create(&payload).await;
    metrics::counter!("rolegate_logins_total", "outcome" => "success").increment(1);
    tracing::info!(session_id = %payload.session_id, email = %principal.email(), "session created");

    let secure = state.secure_cookies();
    (
        AppendHeaders([
            (
                header::SET_COOKIE,
                set_cookie(SESSION_COOKIE, &sealed, session_duration.as_secs(), secure),
            ),
            (header::SET_COOKIE, clear_cookie(LOGIN_COOKIE, secure)),
        ]),
        Redirect::to("/"),
    )
        .into_response()
}

/// POST /auth/logout
///
/// End the session; its role cache goes with it
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let payload = cookie_value(&headers, SESSION_COOKIE)
        .and_then(|cookie| state.codec.open::<SessionPayload>(cookie).ok());
    if let Some(payload) = payload {
        if state.sessions.remove(&payload.session_id).await.is_some() {
            tracing::info!(session_id = %payload.session_id, "session ended");
        }
    }

    (
        AppendHeaders([(
            header::SET_COOKIE,
            clear_cookie(SESSION_COOKIE, state.secure_cookies()),
        )]),
        Redirect::to("/"),
    )
        .into_response()
}

fn login_failure(state: &AppState, error: AuthError) -> Response {
    metrics::counter!(
        "rolegate_logins_total",
        "outcome" => "failure",
        "reason" => error.error_code()
    )
    .increment(1);

    let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        tracing::error!(error = ?error, "sign-in failed");
    } else {
        tracing::warn!(code = error.error_code(), "sign-in failed");
    }

    (
        status,
        AppendHeaders([(
            header::SET_COOKIE,
            clear_cookie(LOGIN_COOKIE, state.secure_cookies()),
        )]),
        Html(views::login_error_page(&error)),
    )
        .into_response()
}
