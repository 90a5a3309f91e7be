//! Portal pages and the signed-in user's API

use axum::extract::{Query, State};
use axum::response::{Html, Redirect};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::extractors::{CurrentSession, OptionalSession};
use crate::gate::{ContentGate, GateDecision, View};
use crate::state::AppState;
use crate::views;

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    #[serde(default)]
    pub refreshed: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserInfo,
    pub roles: Vec<String>,
    /// Content branch the roles select; `None` when access is denied
    pub view: Option<&'static str>,
    /// When this server first saw the session
    pub session_started_at: String,
}

/// GET /
///
/// Login screen when signed out, role-gated content when signed in
pub async fn index(
    State(state): State<AppState>,
    OptionalSession(session): OptionalSession,
    Query(query): Query<IndexQuery>,
) -> Html<String> {
    let Some(session) = session else {
        return Html(views::login_page());
    };

    let roles = state.resolver.get_roles(&session.roles, &session.principal).await;
    let decision = ContentGate::evaluate(&roles);
    let refreshed = query.refreshed.as_deref() == Some("1");

    Html(views::content_page(&session.principal, &roles, decision, refreshed))
}

/// POST /roles/refresh
///
/// Drop the session's cached roles so the next page view re-reads them
pub async fn refresh_roles(State(state): State<AppState>, OptionalSession(session): OptionalSession) -> Redirect {
    match session {
        Some(session) => {
            let removed = state.resolver.refresh_roles(&session.roles, &session.principal);
            tracing::info!(
                session_id = %session.session_id,
                email = %session.principal.email(),
                removed,
                "role cache cleared"
            );
            Redirect::to("/?refreshed=1")
        }
        None => Redirect::to("/"),
    }
}

/// GET /api/v1/me
pub async fn me(State(state): State<AppState>, CurrentSession(session): CurrentSession) -> ApiResult<Json<MeResponse>> {
    let roles = state.resolver.get_roles(&session.roles, &session.principal).await;
    let view = match ContentGate::evaluate(&roles) {
        GateDecision::Denied => None,
        GateDecision::Granted(View::Admin) => Some("admin"),
        GateDecision::Granted(View::Member) => Some("member"),
        GateDecision::Granted(View::Limited) => Some("limited"),
    };

    let principal = &session.principal;
    Ok(Json(MeResponse {
        user: UserInfo {
            id: principal.user_id().to_string(),
            email: principal.email().to_string(),
            name: principal.display_name().to_string(),
        },
        roles: roles.into_vec(),
        view,
        session_started_at: session.created_at.to_rfc3339(),
    }))
}
