//! Session lookup and logout.

use super::{state::AuthState, types::SessionResponse, utils::cleared_session_headers};
use crate::{api::cookies::read_cookie, token::Claims};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

#[utoipa::path(
    get,
    path = "/api/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    // Missing or invalid cookies are reported as "no session".
    match current_user_id(&auth_state, &headers).await {
        Some(user_id) => (StatusCode::OK, Json(SessionResponse { user_id })).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    // Tokens are stateless; dropping the cookies is all there is to revoke.
    (StatusCode::NO_CONTENT, cleared_session_headers(&auth_state))
}

/// Claims of a valid token in the active session cookie.
pub(crate) async fn session_claims(auth_state: &AuthState, headers: &HeaderMap) -> Option<Claims> {
    let token = read_cookie(headers, auth_state.config().active_cookie_name())?;
    match auth_state.tokens().verify(&token).await {
        Ok(claims) => claims,
        Err(err) => {
            error!("Failed to verify session token: {err}");
            None
        }
    }
}

/// User id from a valid session cookie for the active session mode.
pub(crate) async fn current_user_id(
    auth_state: &AuthState,
    headers: &HeaderMap,
) -> Option<String> {
    session_claims(auth_state, headers)
        .await
        .and_then(|claims| claims.current_user_id().map(str::to_string))
}
