//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action the binary runs, resolving every
//! string option into its typed configuration on the way.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, auth, ceremony};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if an argument cannot be turned into its typed value.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let auth_opts = auth::Options::parse(matches)?;
    let ceremony_opts = ceremony::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        jwt_secret: auth_opts.jwt_secret,
        token_ttl: auth_opts.token_ttl,
        jwt_cookie_name: auth_opts.jwt_cookie_name,
        session_cookie_name: auth_opts.session_cookie_name,
        session_mode: auth_opts.session_mode,
        cookie_secure: auth_opts.cookie_secure,
        rate_limit: ceremony_opts.rate_limit,
        challenge_ttl: ceremony_opts.challenge_ttl,
        rp_name: ceremony_opts.rp_name,
        trusted_domains: ceremony_opts.trusted_domains,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SessionMode;

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("PASSGATE_PORT", Some("9090")),
                ("PASSGATE_JWT_SECRET", Some("s3cr3t")),
                ("PASSGATE_SESSION_MODE", Some("ceremony")),
                ("PASSGATE_JWT_EXPIRES_IN", None),
                ("PASSGATE_RATE_LIMIT", None),
                ("PASSGATE_RATE_LIMIT_WINDOW_SECONDS", None),
                ("PASSGATE_CHALLENGE_TTL_SECONDS", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["passgate"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.port, 9090);
                    assert_eq!(args.session_mode, SessionMode::Ceremony);
                    assert_eq!(args.token_ttl.as_secs(), 3600);
                }
            },
        );
    }

    #[test]
    fn invalid_ttl_is_reported() {
        temp_env::with_vars(
            [
                ("PASSGATE_JWT_EXPIRES_IN", Some("0s")),
                ("PASSGATE_RATE_LIMIT", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["passgate"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("--jwt-expires-in"));
                }
            },
        );
    }
}
