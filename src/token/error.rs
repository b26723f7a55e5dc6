use thiserror::Error;

/// Failures that callers are allowed to see.
///
/// Verification problems never appear here: a bad token is reported as
/// `Ok(None)` by [`crate::token::TokenCodec::verify`], never as an error.
#[derive(Debug, Error)]
pub enum Error {
    #[error("token signing secret is not configured")]
    MissingSecret,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("invalid token ttl")]
    InvalidTtl,
}
