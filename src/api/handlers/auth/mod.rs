//! Passkey ceremony and session handlers.
//!
//! ## Ceremony Rate Limiting
//!
//! The `*-challenge` and `*-verify` endpoints are rate limited by the request
//! gate, per client address and path, before these handlers run. The gate also
//! resolves the relying party and hands it down as a request extension.
//!
//! ## Sessions
//!
//! A finished ceremony sets a signed HS256 token in the cookie selected by the
//! session mode. Nothing is stored server side; logout only clears cookies.

pub(crate) mod challenge;
pub(crate) mod session;
mod state;
pub(crate) mod types;
mod utils;
pub(crate) mod verify;

pub use state::{AuthConfig, AuthState, SessionMode};
pub(crate) use session::{current_user_id, session_claims};
pub(crate) use utils::error_response;
