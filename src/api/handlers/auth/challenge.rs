//! `*-challenge` endpoints: start a passkey ceremony.

use super::{
    state::AuthState,
    types::{
        ErrorResponse, LoginChallengeRequest, LoginChallengeResponse, RegisterChallengeRequest,
        RegistrationChallengeResponse,
    },
    utils::{
        ceremony_error_response, challenge_cookie, error_response, relying_party, required_email,
    },
};
use crate::webauthn::RelyingPartyContext;
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, instrument};

#[utoipa::path(
    post,
    path = "/api/auth/register-challenge",
    request_body = RegisterChallengeRequest,
    responses(
        (status = 200, description = "Registration options issued", body = RegistrationChallengeResponse),
        (status = 400, description = "Missing email or inconsistent origin", body = ErrorResponse),
        (status = 409, description = "Account already exists", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn register_challenge(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    resolved: Option<Extension<RelyingPartyContext>>,
    payload: Option<Json<RegisterChallengeRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Missing payload");
    };
    let email = match required_email(request.email.as_deref()) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let username = request.username.unwrap_or_default();
    let relying_party = match relying_party(&auth_state, resolved, &headers) {
        Ok(context) => context,
        Err(response) => return response,
    };

    let ceremony = auth_state.ceremony();
    match ceremony
        .begin_registration(&relying_party, &email, username.trim())
        .await
    {
        Ok((options, challenge)) => {
            debug!(rp_id = %relying_party.rp_id, "registration options issued");
            let mut response_headers = HeaderMap::new();
            if let Some(cookie) =
                challenge_cookie(&auth_state, &challenge.value, ceremony.challenges().ttl())
            {
                response_headers.insert(SET_COOKIE, cookie);
            }
            (
                StatusCode::OK,
                response_headers,
                Json(RegistrationChallengeResponse {
                    success: true,
                    options,
                }),
            )
                .into_response()
        }
        Err(err) => ceremony_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login-challenge",
    request_body = LoginChallengeRequest,
    responses(
        (status = 200, description = "Login options issued", body = LoginChallengeResponse),
        (status = 400, description = "Missing email or inconsistent origin", body = ErrorResponse),
        (status = 404, description = "No passkeys registered for this account", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login_challenge(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    resolved: Option<Extension<RelyingPartyContext>>,
    payload: Option<Json<LoginChallengeRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return error_response(StatusCode::BAD_REQUEST, "Missing payload");
    };
    let email = match required_email(request.email.as_deref()) {
        Ok(email) => email,
        Err(response) => return response,
    };
    let relying_party = match relying_party(&auth_state, resolved, &headers) {
        Ok(context) => context,
        Err(response) => return response,
    };

    let ceremony = auth_state.ceremony();
    match ceremony.begin_login(&relying_party, &email).await {
        Ok((options, challenge)) => {
            let mut response_headers = HeaderMap::new();
            if let Some(cookie) =
                challenge_cookie(&auth_state, &challenge.value, ceremony.challenges().ttl())
            {
                response_headers.insert(SET_COOKIE, cookie);
            }
            (
                StatusCode::OK,
                response_headers,
                Json(LoginChallengeResponse {
                    success: true,
                    options,
                }),
            )
                .into_response()
        }
        Err(err) => ceremony_error_response(&err),
    }
}
