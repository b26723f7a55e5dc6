use crate::{
    api::{self, AuthConfig, AuthState, SessionMode},
    cli::telemetry,
    rate_limit::{RateLimitPolicy, RateLimiter},
    token::TokenCodec,
    webauthn::{
        CeremonyOrchestrator, ChallengeStore, MemoryAccountStore, RelyingPartyResolver,
        UnconfiguredVerifier,
    },
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub jwt_secret: SecretString,
    pub token_ttl: Duration,
    pub jwt_cookie_name: String,
    pub session_cookie_name: String,
    pub session_mode: SessionMode,
    pub cookie_secure: bool,
    pub rate_limit: RateLimitPolicy,
    pub challenge_ttl: Duration,
    pub rp_name: String,
    pub trusted_domains: Vec<String>,
}

/// Build the auth state from CLI arguments.
///
/// # Errors
/// Returns an error if the token signing secret is missing.
pub async fn build_state(args: Args) -> Result<AuthState> {
    let tokens = TokenCodec::new(args.jwt_secret);
    tokens
        .warm_up()
        .await
        .context("Failed to initialize session token key (set PASSGATE_JWT_SECRET)")?;

    let limiter = RateLimiter::in_memory(args.rate_limit);
    limiter.start_prune_task(PRUNE_INTERVAL);

    warn!("No assertion verifier configured, passkey verification will be refused");
    let ceremony = Arc::new(CeremonyOrchestrator::new(
        Arc::new(ChallengeStore::new(args.challenge_ttl)),
        Arc::new(MemoryAccountStore::new()),
        Arc::new(UnconfiguredVerifier),
        &args.rp_name,
    ));
    ceremony.start_prune_task(PRUNE_INTERVAL);

    let config = AuthConfig::new()
        .with_jwt_cookie_name(args.jwt_cookie_name)
        .with_session_cookie_name(args.session_cookie_name)
        .with_session_mode(args.session_mode)
        .with_cookie_secure(args.cookie_secure)
        .with_token_ttl(args.token_ttl);
    debug!(?config, policy = ?args.rate_limit, "auth configuration");

    Ok(AuthState::new(
        config,
        tokens,
        limiter,
        ceremony,
        RelyingPartyResolver::new(args.trusted_domains),
    ))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing key cannot be initialized or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let port = args.port;
    let state = build_state(args).await?;

    let result = api::new(port, Arc::new(state)).await;

    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(secret: &str) -> Args {
        Args {
            port: 0,
            jwt_secret: SecretString::from(secret),
            token_ttl: Duration::from_secs(3600),
            jwt_cookie_name: "token".to_string(),
            session_cookie_name: "myapp-webauthn".to_string(),
            session_mode: SessionMode::Ceremony,
            cookie_secure: false,
            rate_limit: RateLimitPolicy::default(),
            challenge_ttl: Duration::from_secs(120),
            rp_name: "Example".to_string(),
            trusted_domains: vec!["Example.com".to_string()],
        }
    }

    #[tokio::test]
    async fn missing_secret_is_fatal() {
        let result = build_state(args("")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn state_reflects_arguments() -> Result<()> {
        let state = build_state(args("s3cr3t")).await?;
        assert_eq!(state.config().active_cookie_name(), "myapp-webauthn");
        assert!(!state.config().cookie_secure());
        assert_eq!(state.ceremony().rp_name(), "Example");
        assert_eq!(state.ceremony().challenges().ttl(), Duration::from_secs(120));
        assert_eq!(state.relying_party().trusted_domains(), ["example.com"]);
        Ok(())
    }
}
