//! Fixed-window rate limiting for the authentication endpoints.
//!
//! Flow Overview:
//! 1) Derive a caller identity from proxy headers (`client_identifier`).
//! 2) Combine it with the route scope into a bucket key.
//! 3) Count the request in the bucket's current window; reject once the
//!    window's quota is spent and report when the window resets.
//!
//! The counting policy is a plain fixed window: every request in a window counts
//! the same and the whole quota comes back at the window boundary.
//!
//! Scaling: the bucket store is a trait. The in-process `MemoryRateLimitStore`
//! serves single-instance deployments; multi-instance deployments plug in an
//! external counter store without touching call sites.

mod memory;

pub use memory::MemoryRateLimitStore;

use async_trait::async_trait;
use axum::http::HeaderMap;
use std::{sync::Arc, time::Duration};

pub const DEFAULT_LIMIT: u32 = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
pub const UNKNOWN_CLIENT: &str = "unknown";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub retry_after: Duration,
}

impl RateLimitDecision {
    #[must_use]
    pub fn allowed(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn limited(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after,
        }
    }

    /// Whole seconds for a `Retry-After` header, rounded up and never below 1.
    #[must_use]
    pub fn retry_after_seconds(&self) -> u64 {
        let seconds = self.retry_after.as_secs();
        let rounded = if self.retry_after.subsec_nanos() > 0 {
            seconds.saturating_add(1)
        } else {
            seconds
        };
        rounded.max(1)
    }
}

/// Storage for per-key request counters.
///
/// Implementations must treat "read count, compare, increment" as one atomic step
/// per key, otherwise concurrent requests can both observe spare quota.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision;

    /// Drop buckets whose window has lapsed.
    async fn prune(&self) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    /// In-process limiter with the given policy.
    #[must_use]
    pub fn in_memory(policy: RateLimitPolicy) -> Self {
        Self::new(Arc::new(MemoryRateLimitStore::new()), policy)
    }

    #[must_use]
    pub fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    /// Count a request against `key` using the configured policy.
    pub async fn check(&self, key: &str) -> RateLimitDecision {
        self.check_with(key, self.policy.limit, self.policy.window)
            .await
    }

    /// Count a request against `key` with an explicit limit and window.
    pub async fn check_with(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.store.hit(key, limit, window).await
    }

    /// Periodically prune lapsed buckets so idle clients do not accumulate.
    pub fn start_prune_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.prune().await;
            }
        })
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Identify the caller for rate limiting.
///
/// Prefers the first `x-forwarded-for` entry, then `x-real-ip`. Without either,
/// every caller shares the `"unknown"` bucket.
#[must_use]
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_string();
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), str::to_string)
}

/// Bucket key for a caller on a route scope.
#[must_use]
pub fn bucket_key(client: &str, scope: Option<&str>) -> String {
    match scope {
        Some(scope) => format!("{client}|{scope}"),
        None => client.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_identifier_prefers_forwarded() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_identifier(&headers), "1.2.3.4");
    }

    #[test]
    fn client_identifier_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 5.6.7.8"));
        headers.insert("x-real-ip", HeaderValue::from_static(" 9.9.9.9 "));
        assert_eq!(client_identifier(&headers), "9.9.9.9");
    }

    #[test]
    fn client_identifier_unknown_when_missing() {
        assert_eq!(client_identifier(&HeaderMap::new()), UNKNOWN_CLIENT);
    }

    #[test]
    fn bucket_key_includes_scope() {
        assert_eq!(
            bucket_key("1.2.3.4", Some("/api/auth/login-challenge")),
            "1.2.3.4|/api/auth/login-challenge"
        );
        assert_eq!(bucket_key("1.2.3.4", None), "1.2.3.4");
    }

    #[test]
    fn retry_after_rounds_up_with_floor_of_one() {
        assert_eq!(
            RateLimitDecision::limited(Duration::from_millis(1)).retry_after_seconds(),
            1
        );
        assert_eq!(
            RateLimitDecision::limited(Duration::ZERO).retry_after_seconds(),
            1
        );
        assert_eq!(
            RateLimitDecision::limited(Duration::from_millis(59_001)).retry_after_seconds(),
            60
        );
        assert_eq!(
            RateLimitDecision::limited(Duration::from_secs(30)).retry_after_seconds(),
            30
        );
    }

    #[test]
    fn default_policy_is_ten_per_minute() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.limit, 10);
        assert_eq!(policy.window, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn limiter_applies_configured_policy() {
        let limiter = RateLimiter::in_memory(RateLimitPolicy {
            limit: 2,
            window: Duration::from_secs(60),
        });
        assert!(limiter.check("k").await.allowed);
        assert!(limiter.check("k").await.allowed);
        let decision = limiter.check("k").await;
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_seconds(), 60);
    }
}
