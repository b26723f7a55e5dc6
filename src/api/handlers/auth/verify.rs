//! `*-verify` endpoints: finish a passkey ceremony and open a session.
//!
//! The challenge value comes back in the scoped challenge cookie, is consumed
//! before the credential is looked at, and the spent cookie is cleared on
//! success.

use super::{
    state::AuthState,
    types::{ErrorResponse, LoginVerifyRequest, RegisterVerifyRequest, VerifyResponse},
    utils::{
        ceremony_error_response, error_response, relying_party, required_email, session_headers,
    },
};
use crate::{
    api::cookies::{CHALLENGE_COOKIE_NAME, read_cookie},
    webauthn::{Account, RelyingPartyContext},
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info, instrument};

#[utoipa::path(
    post,
    path = "/api/auth/register-verify",
    request_body = RegisterVerifyRequest,
    responses(
        (status = 200, description = "Passkey registered, session cookie set", body = VerifyResponse),
        (status = 400, description = "Missing fields or challenge misuse", body = ErrorResponse),
        (status = 401, description = "Invalid credential", body = ErrorResponse),
        (status = 409, description = "Account already exists", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register_verify(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    resolved: Option<Extension<RelyingPartyContext>>,
    payload: Option<Json<RegisterVerifyRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Missing payload");
    };
    let email = match required_email(request.email.as_deref()) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let Some(credential) = request.credential else {
        return error_response(StatusCode::BAD_REQUEST, "Missing credential");
    };
    let Some(challenge) = read_cookie(&headers, CHALLENGE_COOKIE_NAME) else {
        return error_response(StatusCode::BAD_REQUEST, "Challenge missing or expired");
    };
    let relying_party = match relying_party(&auth_state, resolved, &headers) {
        Ok(context) => context,
        Err(response) => return response,
    };
    let username = request.username.unwrap_or_default();

    let result = auth_state
        .ceremony()
        .finish_registration(
            &relying_party,
            &challenge,
            &email,
            username.trim(),
            &credential,
        )
        .await;
    match result {
        Ok(account) => {
            info!(user_id = %account.user_id, "Passkey registration completed");
            open_session(&auth_state, &account).await
        }
        Err(err) => ceremony_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login-verify",
    request_body = LoginVerifyRequest,
    responses(
        (status = 200, description = "Login verified, session cookie set", body = VerifyResponse),
        (status = 400, description = "Missing fields or challenge misuse", body = ErrorResponse),
        (status = 401, description = "Invalid credential", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login_verify(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    resolved: Option<Extension<RelyingPartyContext>>,
    payload: Option<Json<LoginVerifyRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Missing payload");
    };
    let email = match required_email(request.email.as_deref()) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let Some(credential) = request.credential else {
        return error_response(StatusCode::BAD_REQUEST, "Missing credential");
    };
    let Some(challenge) = read_cookie(&headers, CHALLENGE_COOKIE_NAME) else {
        return error_response(StatusCode::BAD_REQUEST, "Challenge missing or expired");
    };
    let relying_party = match relying_party(&auth_state, resolved, &headers) {
        Ok(context) => context,
        Err(response) => return response,
    };

    let result = auth_state
        .ceremony()
        .finish_login(&relying_party, &challenge, &email, &credential)
        .await;
    match result {
        Ok(account) => {
            info!(user_id = %account.user_id, "Passkey login completed");
            open_session(&auth_state, &account).await
        }
        Err(err) => ceremony_error_response(&err),
    }
}

async fn open_session(auth_state: &AuthState, account: &Account) -> Response {
    let token = match auth_state
        .tokens()
        .issue_for_user(&account.user_id, auth_state.config().token_ttl())
        .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("Failed to issue session token: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };

    (
        StatusCode::OK,
        session_headers(auth_state, &token),
        Json(VerifyResponse {
            success: true,
            user_id: account.user_id.clone(),
        }),
    )
        .into_response()
}
