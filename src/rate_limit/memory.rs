use super::{RateLimitDecision, RateLimitStore};
use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

#[derive(Debug)]
struct Bucket {
    count: u32,
    expires_at: Instant,
}

/// In-process bucket store.
///
/// Each decision runs while holding the map entry for its key, so the
/// check-then-increment cannot interleave with another request on the same key.
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    buckets: DashMap<String, Bucket>,
}

impl MemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }

    fn hit_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> RateLimitDecision {
        let mut entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket {
                count: 0,
                expires_at: now,
            });
        let bucket = entry.value_mut();

        if bucket.expires_at <= now {
            // A window past the clock's range cannot be tracked; refuse instead.
            let Some(expires_at) = now.checked_add(window) else {
                warn!(?window, "rate limit window out of range, rejecting request");
                return RateLimitDecision::limited(window);
            };
            *bucket = Bucket {
                count: 1,
                expires_at,
            };
            return RateLimitDecision::allowed(limit.saturating_sub(1));
        }

        if bucket.count >= limit {
            return RateLimitDecision::limited(bucket.expires_at - now);
        }

        bucket.count += 1;
        RateLimitDecision::allowed(limit - bucket.count)
    }

    fn prune_at(&self, now: Instant) {
        self.buckets.retain(|_, bucket| bucket.expires_at > now);
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, key: &str, limit: u32, window: Duration) -> RateLimitDecision {
        self.hit_at(key, limit, window, Instant::now())
    }

    async fn prune(&self) {
        self.prune_at(Instant::now());
    }
}
