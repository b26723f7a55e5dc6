//! Small helpers shared by the ceremony and session handlers.

use super::{state::AuthState, types::ErrorResponse};
use crate::{
    api::cookies::{CHALLENGE_COOKIE_NAME, CHALLENGE_COOKIE_PATH, build_cookie, clear_cookie},
    webauthn::{CeremonyError, ChallengeError, RelyingPartyContext, VerifierError},
};
use axum::{
    Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{HOST, ORIGIN, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use regex::Regex;
use std::time::Duration;
use tracing::error;

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Normalized email from an optional body field, or a 400 response.
pub(super) fn required_email(email: Option<&str>) -> Result<String, Response> {
    let email = email.map(normalize_email).unwrap_or_default();
    if email.is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "Email is required"));
    }
    if !valid_email(&email) {
        return Err(error_response(StatusCode::BAD_REQUEST, "Invalid email"));
    }
    Ok(email)
}

pub(crate) fn error_response(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Map ceremony failures to client responses without leaking internals.
pub(super) fn ceremony_error_response(err: &CeremonyError) -> Response {
    match err {
        CeremonyError::Challenge(ChallengeError::Rng(_) | ChallengeError::TtlOutOfRange)
        | CeremonyError::Accounts(_) => {
            error!("Ceremony failed: {err}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
        CeremonyError::Challenge(_) => {
            error_response(StatusCode::BAD_REQUEST, "Challenge missing or expired")
        }
        CeremonyError::PurposeMismatch { .. }
        | CeremonyError::RelyingPartyMismatch
        | CeremonyError::SubjectMismatch => {
            error_response(StatusCode::BAD_REQUEST, "Challenge does not match this request")
        }
        CeremonyError::AccountExists => error_response(StatusCode::CONFLICT, "Account already exists"),
        CeremonyError::UnknownAccount => {
            error_response(StatusCode::NOT_FOUND, "No passkeys registered for this account")
        }
        CeremonyError::InvalidCredential(VerifierError::Unavailable) => {
            error!("Ceremony failed: {err}");
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Credential verification unavailable",
            )
        }
        CeremonyError::InvalidCredential(_) | CeremonyError::CredentialMismatch => {
            error_response(StatusCode::UNAUTHORIZED, "Invalid credential")
        }
    }
}

/// Relying party resolved by the gate, or resolved here when the handler runs
/// without it.
pub(super) fn relying_party(
    auth_state: &AuthState,
    resolved: Option<Extension<RelyingPartyContext>>,
    headers: &HeaderMap,
) -> Result<RelyingPartyContext, Response> {
    if let Some(Extension(context)) = resolved {
        return Ok(context);
    }
    let host = headers.get(HOST).and_then(|value| value.to_str().ok());
    let origin = headers.get(ORIGIN).and_then(|value| value.to_str().ok());
    auth_state
        .relying_party()
        .resolve(host, origin)
        .map_err(|err| error_response(StatusCode::BAD_REQUEST, &err.to_string()))
}

pub(super) fn challenge_cookie(
    auth_state: &AuthState,
    value: &str,
    ttl: Duration,
) -> Option<HeaderValue> {
    build_cookie(
        CHALLENGE_COOKIE_NAME,
        value,
        CHALLENGE_COOKIE_PATH,
        ttl,
        auth_state.config().cookie_secure(),
    )
    .map_err(|err| error!("Failed to build challenge cookie: {err}"))
    .ok()
}

/// `Set-Cookie` headers for a fresh session: the token in the active session
/// cookie and the spent challenge cleared.
pub(super) fn session_headers(auth_state: &AuthState, token: &str) -> HeaderMap {
    let config = auth_state.config();
    let mut headers = HeaderMap::new();
    match build_cookie(
        config.active_cookie_name(),
        token,
        "/",
        config.token_ttl(),
        config.cookie_secure(),
    ) {
        Ok(cookie) => {
            headers.append(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build session cookie: {err}"),
    }
    if let Ok(cookie) = clear_cookie(
        CHALLENGE_COOKIE_NAME,
        CHALLENGE_COOKIE_PATH,
        config.cookie_secure(),
    ) {
        headers.append(SET_COOKIE, cookie);
    }
    headers
}

/// `Set-Cookie` headers that drop both session cookies and any pending challenge.
pub(super) fn cleared_session_headers(auth_state: &AuthState) -> HeaderMap {
    let config = auth_state.config();
    let secure = config.cookie_secure();
    let mut headers = HeaderMap::new();
    for cookie in [
        clear_cookie(config.jwt_cookie_name(), "/", secure),
        clear_cookie(config.session_cookie_name(), "/", secure),
        clear_cookie(CHALLENGE_COOKIE_NAME, CHALLENGE_COOKIE_PATH, secure),
    ]
    .into_iter()
    .flatten()
    {
        headers.append(SET_COOKIE, cookie);
    }
    headers
}
