//! `Cookie` parsing and `Set-Cookie` construction.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{COOKIE, InvalidHeaderValue},
};
use std::time::Duration;

/// Carries the pending ceremony challenge between `*-challenge` and `*-verify`.
pub const CHALLENGE_COOKIE_NAME: &str = "passgate_challenge";
pub const CHALLENGE_COOKIE_PATH: &str = "/api/auth";

/// Value of the first cookie called `name`, across all `Cookie` headers.
pub(crate) fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `HttpOnly`, `SameSite=Lax` cookie scoped to `path`.
pub(crate) fn build_cookie(
    name: &str,
    value: &str,
    path: &str,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let max_age = max_age.as_secs();
    let mut cookie =
        format!("{name}={value}; Path={path}; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(crate) fn clear_cookie(
    name: &str,
    path: &str,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(name, "", path, Duration::ZERO, secure)
}
