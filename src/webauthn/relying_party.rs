//! Relying-party identity for passkey ceremonies.
//!
//! The relying-party id is derived per request instead of being fixed in config,
//! so one deployment can serve its own host and configured public domains that
//! reach it through a proxy.

use thiserror::Error;
use url::Url;

pub const DEFAULT_HOST: &str = "localhost";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelyingPartyError {
    #[error("origin host {origin_host} is not within relying party {rp_id}")]
    OriginMismatch { origin_host: String, rp_id: String },
    #[error("origin {0} is not a valid http(s) origin")]
    InvalidOrigin(String),
}

/// Relying-party id plus the origin the browser is expected to report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelyingPartyContext {
    pub rp_id: String,
    pub origin: String,
}

#[derive(Clone, Debug, Default)]
pub struct RelyingPartyResolver {
    trusted_domains: Vec<String>,
}

impl RelyingPartyResolver {
    #[must_use]
    pub fn new<I, S>(trusted_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut domains: Vec<String> = Vec::new();
        for domain in trusted_domains {
            let domain = domain.as_ref().trim().trim_matches('.').to_ascii_lowercase();
            if !domain.is_empty() && !domains.contains(&domain) {
                domains.push(domain);
            }
        }
        Self {
            trusted_domains: domains,
        }
    }

    #[must_use]
    pub fn trusted_domains(&self) -> &[String] {
        &self.trusted_domains
    }

    #[must_use]
    pub fn is_trusted(&self, host: &str) -> bool {
        self.trusted_domains
            .iter()
            .any(|domain| is_same_or_subdomain(host, domain))
    }

    /// Relying-party id for a request.
    ///
    /// Uses the origin's host when it differs from the `Host` header and is a
    /// trusted public domain; otherwise the `Host` header without its port.
    #[must_use]
    pub fn rp_id(&self, host: Option<&str>, origin: Option<&str>) -> String {
        let host = request_hostname(host);
        let origin_host = origin
            .and_then(|origin| parse_origin(origin).ok())
            .map(|(_, origin_host)| origin_host);

        match origin_host {
            Some(origin_host) if origin_host != host && self.is_trusted(&origin_host) => {
                origin_host
            }
            _ => host,
        }
    }

    /// Expected origin: the `Origin` header when well-formed, else `https://<host>`.
    #[must_use]
    pub fn origin(&self, origin: Option<&str>, host: Option<&str>) -> String {
        origin
            .and_then(|origin| parse_origin(origin).ok())
            .map_or_else(
                || {
                    let host = host
                        .map(str::trim)
                        .filter(|host| !host.is_empty())
                        .unwrap_or(DEFAULT_HOST);
                    format!("https://{}", host.to_ascii_lowercase())
                },
                |(normalized, _)| normalized,
            )
    }

    /// Resolve both values and check they agree.
    ///
    /// # Errors
    /// Returns `RelyingPartyError::OriginMismatch` when the origin host is neither
    /// the relying-party id nor a subdomain of it.
    pub fn resolve(
        &self,
        host: Option<&str>,
        origin: Option<&str>,
    ) -> Result<RelyingPartyContext, RelyingPartyError> {
        let rp_id = self.rp_id(host, origin);
        let origin = self.origin(origin, host);
        let (_, origin_host) = parse_origin(&origin)?;
        if !is_same_or_subdomain(&origin_host, &rp_id) {
            return Err(RelyingPartyError::OriginMismatch { origin_host, rp_id });
        }
        Ok(RelyingPartyContext { rp_id, origin })
    }
}

/// `Host` header value without its port, lowercased.
fn request_hostname(host: Option<&str>) -> String {
    let host = host
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .unwrap_or(DEFAULT_HOST);
    strip_port(host).to_ascii_lowercase()
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [::1]:8080
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

/// Normalize an origin to `scheme://host[:port]` and return it with its host.
fn parse_origin(origin: &str) -> Result<(String, String), RelyingPartyError> {
    let invalid = || RelyingPartyError::InvalidOrigin(origin.to_string());
    let parsed = Url::parse(origin.trim()).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    let host = parsed.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    Ok((format!("{}://{}{}", parsed.scheme(), host, port), host))
}

fn is_same_or_subdomain(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> RelyingPartyResolver {
        RelyingPartyResolver::new(["example.com", " Passgate.DEV ", ""])
    }

    #[test]
    fn trusted_domains_are_normalized() {
        assert_eq!(
            resolver().trusted_domains(),
            &["example.com".to_string(), "passgate.dev".to_string()]
        );
    }

    #[test]
    fn rp_id_defaults_to_localhost() {
        assert_eq!(resolver().rp_id(None, None), "localhost");
        assert_eq!(resolver().rp_id(Some("  "), None), "localhost");
    }

    #[test]
    fn rp_id_strips_port_from_host() {
        let resolver = resolver();
        assert_eq!(resolver.rp_id(Some("localhost:3000"), None), "localhost");
        assert_eq!(resolver.rp_id(Some("App.Internal:8443"), None), "app.internal");
        assert_eq!(resolver.rp_id(Some("[::1]:8080"), None), "[::1]");
    }

    #[test]
    fn rp_id_prefers_trusted_origin_host() {
        let resolver = resolver();
        assert_eq!(
            resolver.rp_id(Some("internal:8080"), Some("https://app.example.com")),
            "app.example.com"
        );
        assert_eq!(
            resolver.rp_id(Some("internal:8080"), Some("https://evil.test")),
            "internal"
        );
        assert_eq!(
            resolver.rp_id(Some("internal:8080"), Some("https://notexample.com")),
            "internal"
        );
    }

    #[test]
    fn origin_falls_back_to_https_host() {
        let resolver = resolver();
        assert_eq!(
            resolver.origin(Some("http://localhost:3000/"), Some("localhost:3000")),
            "http://localhost:3000"
        );
        assert_eq!(
            resolver.origin(Some("not a url"), Some("localhost:3000")),
            "https://localhost:3000"
        );
        assert_eq!(
            resolver.origin(Some("ftp://example.com"), Some("example.com")),
            "https://example.com"
        );
        assert_eq!(resolver.origin(None, None), "https://localhost");
    }

    #[test]
    fn resolve_accepts_same_site() -> Result<(), RelyingPartyError> {
        let context = resolver().resolve(Some("localhost:3000"), Some("http://localhost:3000"))?;
        assert_eq!(
            context,
            RelyingPartyContext {
                rp_id: "localhost".to_string(),
                origin: "http://localhost:3000".to_string(),
            }
        );

        let context = resolver().resolve(Some("example.com"), Some("https://www.example.com"))?;
        assert_eq!(context.rp_id, "www.example.com");
        Ok(())
    }

    #[test]
    fn resolve_rejects_foreign_origin() {
        let err = resolver()
            .resolve(Some("internal:8080"), Some("https://evil.test"))
            .err();
        assert_eq!(
            err,
            Some(RelyingPartyError::OriginMismatch {
                origin_host: "evil.test".to_string(),
                rp_id: "internal".to_string(),
            })
        );
    }

    #[test]
    fn resolve_accepts_subdomain_of_host() -> Result<(), RelyingPartyError> {
        let resolver = RelyingPartyResolver::default();
        let context = resolver.resolve(Some("example.org"), Some("https://login.example.org"))?;
        assert_eq!(context.rp_id, "example.org");
        assert_eq!(context.origin, "https://login.example.org");
        Ok(())
    }

    #[test]
    fn subdomain_match_requires_label_boundary() {
        assert!(is_same_or_subdomain("a.example.com", "example.com"));
        assert!(is_same_or_subdomain("example.com", "example.com"));
        assert!(!is_same_or_subdomain("badexample.com", "example.com"));
    }
}
