use crate::{
    api::SessionMode,
    token::{DEFAULT_TOKEN_TTL, parse_ttl},
};
use anyhow::{Context, Result, anyhow};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_EXPIRES_IN: &str = "jwt-expires-in";
pub const ARG_JWT_COOKIE_NAME: &str = "jwt-cookie-name";
pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";
pub const ARG_SESSION_MODE: &str = "session-mode";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub token_ttl: Duration,
    pub jwt_cookie_name: String,
    pub session_cookie_name: String,
    pub session_mode: SessionMode,
    pub cookie_secure: bool,
}

impl Options {
    /// # Errors
    /// Returns an error if the token TTL or session mode cannot be parsed.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        // An absent secret is reported when the signing key is first built.
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .map(|secret| SecretString::from(secret.clone()))
            .unwrap_or_default();

        let expires_in = matches
            .get_one::<String>(ARG_JWT_EXPIRES_IN)
            .map_or(DEFAULT_TOKEN_TTL, String::as_str);
        let token_ttl = parse_ttl(expires_in)
            .with_context(|| format!("invalid --{ARG_JWT_EXPIRES_IN}: {expires_in}"))?;

        let session_mode = matches
            .get_one::<String>(ARG_SESSION_MODE)
            .map_or(Ok(SessionMode::default()), |mode| mode.parse())
            .map_err(|err| anyhow!(err))?;

        Ok(Self {
            jwt_secret,
            token_ttl,
            jwt_cookie_name: matches
                .get_one::<String>(ARG_JWT_COOKIE_NAME)
                .cloned()
                .context("missing required argument: --jwt-cookie-name")?,
            session_cookie_name: matches
                .get_one::<String>(ARG_SESSION_COOKIE_NAME)
                .cloned()
                .context("missing required argument: --session-cookie-name")?,
            session_mode,
            cookie_secure: matches
                .get_one::<bool>(ARG_COOKIE_SECURE)
                .copied()
                .unwrap_or(true),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to sign session tokens")
                .env("PASSGATE_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_JWT_EXPIRES_IN)
                .long(ARG_JWT_EXPIRES_IN)
                .help("Session token lifetime, e.g. 1h, 30m, 7d or seconds")
                .env("PASSGATE_JWT_EXPIRES_IN")
                .default_value(DEFAULT_TOKEN_TTL),
        )
        .arg(
            Arg::new(ARG_JWT_COOKIE_NAME)
                .long(ARG_JWT_COOKIE_NAME)
                .help("Cookie carrying the session token in token mode")
                .env("PASSGATE_JWT_COOKIE_NAME")
                .default_value("token"),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long(ARG_SESSION_COOKIE_NAME)
                .help("Cookie carrying the session token in ceremony mode")
                .env("PASSGATE_SESSION_COOKIE_NAME")
                .default_value("myapp-webauthn"),
        )
        .arg(
            Arg::new(ARG_SESSION_MODE)
                .long(ARG_SESSION_MODE)
                .help("Which cookie authenticates protected pages")
                .env("PASSGATE_SESSION_MODE")
                .default_value("token")
                .value_parser(["token", "ceremony"]),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark cookies Secure (disable only for plain-http development)")
                .env("PASSGATE_COOKIE_SECURE")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
}
