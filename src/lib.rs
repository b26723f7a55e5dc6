//! # Passgate (authentication primitives for web front ends)
//!
//! `passgate` is the authentication layer that sits in front of a web application.
//! It issues and verifies stateless signed session tokens, bounds abuse of the
//! authentication endpoints with a fixed-window rate limiter, and orchestrates the
//! single-use challenges behind passkey registration and login ceremonies.
//!
//! ## Session Tokens (`HS256`)
//!
//! Sessions are compact `header.payload.signature` tokens signed with HMAC-SHA256.
//! No session record is kept on the server; a token is valid until its `exp` passes
//! or the client discards it. Every verification failure collapses into the same
//! "invalid" outcome so callers cannot learn why a token was rejected.
//!
//! ## Rate Limiting
//!
//! Ceremony endpoints (`/api/auth/*-challenge`, `/api/auth/*-verify`) are limited per
//! client IP and endpoint with a fixed window (10 requests per 60 seconds by default).
//! Rejected callers receive `429 Too Many Requests` with a `Retry-After` header.
//!
//! ## Passkey Ceremonies
//!
//! Challenges are random, bound to a relying party and a purpose, and consumed
//! exactly once. The public-key verification of the authenticator response is an
//! injected capability (`webauthn::AssertionVerifier`), not implemented here.

pub mod api;
pub mod cli;
pub mod rate_limit;
pub mod token;
pub mod webauthn;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
