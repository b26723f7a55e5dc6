use crate::{
    rate_limit::{DEFAULT_LIMIT, DEFAULT_WINDOW, RateLimitPolicy},
    webauthn::{DEFAULT_CHALLENGE_TTL, DEFAULT_RP_NAME},
};
use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_RATE_LIMIT: &str = "rate-limit";
pub const ARG_RATE_LIMIT_WINDOW_SECONDS: &str = "rate-limit-window-seconds";
pub const ARG_CHALLENGE_TTL_SECONDS: &str = "challenge-ttl-seconds";
pub const ARG_RP_NAME: &str = "rp-name";
pub const ARG_TRUSTED_DOMAINS: &str = "trusted-domains";

pub const MAX_RATE_LIMIT_WINDOW_SECONDS: u64 = 86_400;
pub const MAX_CHALLENGE_TTL_SECONDS: u64 = 3_600;

#[derive(Debug)]
pub struct Options {
    pub rate_limit: RateLimitPolicy,
    pub challenge_ttl: Duration,
    pub rp_name: String,
    pub trusted_domains: Vec<String>,
}

impl Options {
    /// # Errors
    /// Returns an error if the rate limit is zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let limit = matches
            .get_one::<u32>(ARG_RATE_LIMIT)
            .copied()
            .unwrap_or(DEFAULT_LIMIT);
        let window = matches
            .get_one::<u64>(ARG_RATE_LIMIT_WINDOW_SECONDS)
            .map_or(DEFAULT_WINDOW, |seconds| Duration::from_secs(*seconds));
        let challenge_ttl = matches
            .get_one::<u64>(ARG_CHALLENGE_TTL_SECONDS)
            .map_or(DEFAULT_CHALLENGE_TTL, |seconds| Duration::from_secs(*seconds));

        if limit == 0 {
            bail!("--{ARG_RATE_LIMIT} must be greater than 0");
        }

        Ok(Self {
            rate_limit: RateLimitPolicy { limit, window },
            challenge_ttl,
            rp_name: matches
                .get_one::<String>(ARG_RP_NAME)
                .cloned()
                .unwrap_or_else(|| DEFAULT_RP_NAME.to_string()),
            trusted_domains: matches
                .get_many::<String>(ARG_TRUSTED_DOMAINS)
                .map(|domains| {
                    domains
                        .map(|domain| domain.trim())
                        .filter(|domain| !domain.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_RATE_LIMIT)
                .long(ARG_RATE_LIMIT)
                .help("Ceremony requests allowed per client and endpoint in each window")
                .env("PASSGATE_RATE_LIMIT")
                .default_value("10")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .long(ARG_RATE_LIMIT_WINDOW_SECONDS)
                .help("Rate limit window in seconds")
                .env("PASSGATE_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_RATE_LIMIT_WINDOW_SECONDS)),
        )
        .arg(
            Arg::new(ARG_CHALLENGE_TTL_SECONDS)
                .long(ARG_CHALLENGE_TTL_SECONDS)
                .help("Lifetime of an issued ceremony challenge in seconds")
                .env("PASSGATE_CHALLENGE_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_CHALLENGE_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_RP_NAME)
                .long(ARG_RP_NAME)
                .help("Relying party display name shown by authenticators")
                .env("PASSGATE_RP_NAME")
                .default_value(DEFAULT_RP_NAME),
        )
        .arg(
            Arg::new(ARG_TRUSTED_DOMAINS)
                .long(ARG_TRUSTED_DOMAINS)
                .help("Comma separated public domains allowed as relying-party ids")
                .long_help(
                    "Comma separated public domains allowed as relying-party ids. When a request \
                     comes through a proxy whose Origin host differs from Host, the Origin host \
                     is used as rp id only if it is one of these domains or a subdomain.",
                )
                .env("PASSGATE_TRUSTED_DOMAINS")
                .value_delimiter(','),
        )
}
