//! Cookies and the signed-in session extractor

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use rolegate_auth_core::SessionPayload;

use crate::error::ApiError;
use crate::state::{AppState, SessionContext};

/// Session cookie name
pub const SESSION_COOKIE: &str = "rolegate_session";

/// Pending-login cookie name, set between `/auth/login` and the callback
pub const LOGIN_COOKIE: &str = "rolegate_login";

/// Value of a cookie in the request headers
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value for an HttpOnly cookie
pub fn set_cookie(name: &str, value: &str, max_age_secs: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!("{name}={value}; HttpOnly{secure}; SameSite=Lax; Path=/; Max-Age={max_age_secs}")
}

/// `Set-Cookie` value that deletes a cookie
pub fn clear_cookie(name: &str, secure: bool) -> String {
    set_cookie(name, "", 0, secure)
}

/// Signed-in session; rejects with 401 when there is none
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Arc<SessionContext>);

impl<S> FromRequestParts<S> for CurrentSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let cookie = cookie_value(&parts.headers, SESSION_COOKIE).ok_or(ApiError::NotSignedIn)?;

        let payload: SessionPayload = app_state.codec.open(cookie).map_err(|e| {
            tracing::debug!(error = %e, "Session cookie rejected");
            ApiError::NotSignedIn
        })?;

        let session = app_state.sessions.get(&payload).await.ok_or_else(|| {
            tracing::debug!(session_id = %payload.session_id, "Session not registered - rejecting");
            ApiError::NotSignedIn
        })?;

        Ok(CurrentSession(session))
    }
}

/// Session extractor that doesn't fail when signed out
#[derive(Debug, Clone)]
pub struct OptionalSession(pub Option<Arc<SessionContext>>);

impl<S> FromRequestParts<S> for OptionalSession
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match CurrentSession::from_request_parts(parts, state).await {
            Ok(CurrentSession(session)) => Ok(OptionalSession(Some(session))),
            Err(_) => Ok(OptionalSession(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; rolegate_session=abc.def; other=1"),
        );
        assert_eq!(cookie_value(&headers, SESSION_COOKIE), Some("abc.def"));
        assert_eq!(cookie_value(&headers, LOGIN_COOKIE), None);
    }

    #[test]
    fn test_cookie_value_across_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::COOKIE, HeaderValue::from_static("rolegate_login=xyz"));
        assert_eq!(cookie_value(&headers, LOGIN_COOKIE), Some("xyz"));
    }

    #[test]
    fn test_set_cookie_attributes() {
        let cookie = set_cookie(SESSION_COOKIE, "v", 60, true);
        assert_eq!(
            cookie,
            "rolegate_session=v; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=60"
        );
        assert!(!clear_cookie(LOGIN_COOKIE, false).contains("Secure"));
        assert!(clear_cookie(LOGIN_COOKIE, false).contains("Max-Age=0"));
    }
}
