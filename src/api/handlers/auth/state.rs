//! Auth state and cookie/session configuration.

use crate::{
    rate_limit::RateLimiter,
    token::TokenCodec,
    webauthn::{CeremonyOrchestrator, RelyingPartyResolver},
};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};

pub const DEFAULT_JWT_COOKIE_NAME: &str = "token";
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "myapp-webauthn";
const DEFAULT_TOKEN_TTL_SECONDS: u64 = 60 * 60;

/// Which cookie carries the authenticated session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionMode {
    /// Signed token in the JWT cookie (`token` by default).
    #[default]
    Token,
    /// Signed token in the ceremony session cookie (`myapp-webauthn` by default).
    Ceremony,
}

impl SessionMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Ceremony => "ceremony",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "token" => Ok(Self::Token),
            "ceremony" => Ok(Self::Ceremony),
            other => Err(format!("unknown session mode: {other}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    jwt_cookie_name: String,
    session_cookie_name: String,
    session_mode: SessionMode,
    cookie_secure: bool,
    token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            jwt_cookie_name: DEFAULT_JWT_COOKIE_NAME.to_string(),
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            session_mode: SessionMode::default(),
            cookie_secure: true,
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECONDS),
        }
    }

    #[must_use]
    pub fn with_jwt_cookie_name(mut self, name: String) -> Self {
        self.jwt_cookie_name = name;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: String) -> Self {
        self.session_cookie_name = name;
        self
    }

    #[must_use]
    pub fn with_session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    #[must_use]
    pub fn jwt_cookie_name(&self) -> &str {
        &self.jwt_cookie_name
    }

    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.session_cookie_name
    }

    #[must_use]
    pub fn session_mode(&self) -> SessionMode {
        self.session_mode
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Cookie the gate and session endpoint read for the active mode.
    #[must_use]
    pub fn active_cookie_name(&self) -> &str {
        match self.session_mode {
            SessionMode::Token => &self.jwt_cookie_name,
            SessionMode::Ceremony => &self.session_cookie_name,
        }
    }
}

/// Shared per-process auth dependencies.
pub struct AuthState {
    config: AuthConfig,
    tokens: TokenCodec,
    limiter: RateLimiter,
    ceremony: Arc<CeremonyOrchestrator>,
    relying_party: RelyingPartyResolver,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        tokens: TokenCodec,
        limiter: RateLimiter,
        ceremony: Arc<CeremonyOrchestrator>,
        relying_party: RelyingPartyResolver,
    ) -> Self {
        Self {
            config,
            tokens,
            limiter,
            ceremony,
            relying_party,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    #[must_use]
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    #[must_use]
    pub fn ceremony(&self) -> &CeremonyOrchestrator {
        &self.ceremony
    }

    #[must_use]
    pub fn relying_party(&self) -> &RelyingPartyResolver {
        &self.relying_party
    }
}

impl fmt::Debug for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("tokens", &self.tokens)
            .field("limiter", &self.limiter)
            .field("ceremony", &self.ceremony)
            .field("relying_party", &self.relying_party)
            .finish()
    }
}
