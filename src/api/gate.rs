//! Request gate applied in front of every route.
//!
//! Flow Overview:
//! 1) Ceremony endpoints (`/api/auth/*-challenge`, `/api/auth/*-verify`) are
//!    rate limited per client and path, then get their relying party resolved
//!    and attached as a request extension.
//! 2) Every other `/api` path passes through; handlers own their auth.
//! 3) Public pages pass through.
//! 4) Anything else needs a valid session token carrying `userId` in the
//!    active session cookie, otherwise the caller is redirected to
//!    `/sign-in?next=<path>`.

use super::handlers::auth::{AuthState, error_response, session_claims};
use crate::rate_limit::{RateLimitDecision, bucket_key, client_identifier};
use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderMap, HeaderName, HeaderValue, Request, StatusCode,
        header::{HOST, ORIGIN, RETRY_AFTER},
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

pub const SIGN_IN_PATH: &str = "/sign-in";
const PUBLIC_PREFIXES: [&str; 3] = [SIGN_IN_PATH, "/sign-up", "/faceid"];
const CEREMONY_PREFIX: &str = "/api/auth/";
const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// User id of the caller on gated pages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// `/api/auth/*-challenge` and `/api/auth/*-verify`.
#[must_use]
pub fn is_ceremony_path(path: &str) -> bool {
    path.strip_prefix(CEREMONY_PREFIX).is_some_and(|rest| {
        !rest.is_empty()
            && !rest.contains('/')
            && (rest.ends_with("-challenge") || rest.ends_with("-verify"))
    })
}

#[must_use]
pub fn is_api_path(path: &str) -> bool {
    path == "/api" || path.starts_with("/api/")
}

/// `/` matches exactly; the other public pages match as prefixes.
#[must_use]
pub fn is_public_path(path: &str) -> bool {
    path == "/" || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// `/sign-in?next=<path>` with `path` form-encoded.
#[must_use]
pub fn sign_in_location(path: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("next", path)
        .finish();
    format!("{SIGN_IN_PATH}?{query}")
}

pub async fn gate(
    State(auth_state): State<Arc<AuthState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_ceremony_path(&path) {
        let client = client_identifier(request.headers());
        let decision = auth_state
            .limiter()
            .check(&bucket_key(&client, Some(&path)))
            .await;
        if !decision.allowed {
            warn!(client = %client, path = %path, "Rate limit exceeded");
            return too_many_requests(&decision);
        }

        let context = {
            let headers = request.headers();
            let host = header_str(headers, &HOST);
            let origin = header_str(headers, &ORIGIN);
            auth_state.relying_party().resolve(host, origin)
        };
        match context {
            Ok(context) => {
                request.extensions_mut().insert(context);
            }
            Err(err) => {
                debug!("Relying party resolution failed: {err}");
                return error_response(StatusCode::BAD_REQUEST, &err.to_string());
            }
        }

        let mut response = next.run(request).await;
        let limit = auth_state.limiter().policy().limit;
        let headers = response.headers_mut();
        headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(limit));
        headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
        return response;
    }

    if is_api_path(&path) || is_public_path(&path) {
        return next.run(request).await;
    }

    let user_id = session_claims(&auth_state, request.headers())
        .await
        .and_then(|claims| claims.session_user_id().map(str::to_string));
    match user_id {
        Some(user_id) => {
            request.extensions_mut().insert(AuthenticatedUser(user_id));
            next.run(request).await
        }
        None => Redirect::temporary(&sign_in_location(&path)).into_response(),
    }
}

fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let mut response = error_response(StatusCode::TOO_MANY_REQUESTS, "Too many requests");
    let headers = response.headers_mut();
    headers.insert(RETRY_AFTER, HeaderValue::from(decision.retry_after_seconds()));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(0_u32));
    response
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
