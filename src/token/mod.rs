//! Stateless session tokens.
//!
//! Wire format: `base64url(header).base64url(payload).base64url(hmac_sha256)`, no
//! padding, header fixed to `{"alg":"HS256","typ":"JWT"}`.

mod claims;
mod error;
mod hs256;

pub use claims::Claims;
pub use error::Error;
pub use hs256::{ALGORITHM, TokenCodec, TokenHeader};

pub(crate) use hs256::unix_now;

use std::time::Duration;

pub const DEFAULT_TOKEN_TTL: &str = "1h";

/// Parse a token lifetime such as `"1h"`, `"30m"`, `"7d"` or a bare number of seconds.
///
/// # Errors
/// Returns `Error::InvalidTtl` for unparseable or zero durations.
pub fn parse_ttl(value: &str) -> Result<Duration, Error> {
    let value = value.trim();
    let ttl = match value.parse::<u64>() {
        Ok(seconds) => Duration::from_secs(seconds),
        Err(_) => humantime::parse_duration(value).map_err(|_| Error::InvalidTtl)?,
    };
    if ttl.is_zero() {
        return Err(Error::InvalidTtl);
    }
    Ok(ttl)
}

impl TokenCodec {
    /// Issue the session token handed out after a successful ceremony.
    ///
    /// # Errors
    /// See [`TokenCodec::sign`].
    pub async fn issue_for_user(&self, user_id: &str, ttl: Duration) -> Result<String, Error> {
        self.sign(&Claims::for_user(user_id), Some(ttl)).await
    }
}
