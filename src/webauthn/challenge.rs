//! Single-use ceremony challenges.
//!
//! A challenge is 32 random bytes, base64url encoded, remembered server side with
//! its purpose and relying party. Consuming it marks the entry and leaves a
//! tombstone until the entry's expiry, so a replay reports `AlreadyConsumed`
//! rather than `NotFound`.

use super::relying_party::RelyingPartyContext;
use base64ct::{Base64UrlUnpadded, Encoding};
use dashmap::DashMap;
use rand::{RngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

pub const CHALLENGE_BYTES: usize = 32;
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(300);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CeremonyPurpose {
    Registration,
    Login,
}

impl std::fmt::Display for CeremonyPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Login => write!(f, "login"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub value: String,
    pub purpose: CeremonyPurpose,
    pub rp_id: String,
    pub origin: String,
    /// Normalized email the ceremony was started for.
    pub subject: String,
    /// Candidate user id, registration only.
    pub user_handle: Option<String>,
    pub issued_at: Instant,
    pub expires_at: Instant,
    pub consumed: bool,
}

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("challenge not found")]
    NotFound,
    #[error("challenge already used")]
    AlreadyConsumed,
    #[error("challenge expired")]
    Expired,
    #[error("challenge lifetime out of range")]
    TtlOutOfRange,
    #[error("failed to generate challenge: {0}")]
    Rng(#[from] rand::Error),
}

#[derive(Debug)]
pub struct ChallengeStore {
    entries: DashMap<String, Challenge>,
    ttl: Duration,
}

impl Default for ChallengeStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHALLENGE_TTL)
    }
}

impl ChallengeStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Issue and remember a fresh challenge.
    ///
    /// # Errors
    /// Returns `ChallengeError::Rng` if the OS random source fails and
    /// `ChallengeError::TtlOutOfRange` if the expiry cannot be represented.
    pub fn issue(
        &self,
        purpose: CeremonyPurpose,
        relying_party: &RelyingPartyContext,
        subject: &str,
        user_handle: Option<String>,
    ) -> Result<Challenge, ChallengeError> {
        let value = generate_challenge()?;
        let issued_at = Instant::now();
        let expires_at = issued_at
            .checked_add(self.ttl)
            .ok_or(ChallengeError::TtlOutOfRange)?;
        let challenge = Challenge {
            value: value.clone(),
            purpose,
            rp_id: relying_party.rp_id.clone(),
            origin: relying_party.origin.clone(),
            subject: subject.to_string(),
            user_handle,
            issued_at,
            expires_at,
            consumed: false,
        };
        self.entries.insert(value, challenge.clone());
        Ok(challenge)
    }

    /// Consume a presented challenge exactly once.
    ///
    /// # Errors
    /// `NotFound` for unknown values, `AlreadyConsumed` on replay and `Expired`
    /// once the TTL has lapsed.
    pub fn consume(&self, presented: &str) -> Result<Challenge, ChallengeError> {
        let now = Instant::now();
        // The shard write lock is held until `entry` drops.
        let mut entry = self
            .entries
            .get_mut(presented)
            .ok_or(ChallengeError::NotFound)?;
        if entry.consumed {
            return Err(ChallengeError::AlreadyConsumed);
        }
        if entry.expires_at <= now {
            entry.consumed = true;
            return Err(ChallengeError::Expired);
        }
        entry.consumed = true;
        Ok(entry.value().clone())
    }

    /// Remove entries past their expiry, consumed or not.
    pub fn prune(&self) {
        let now = Instant::now();
        self.entries.retain(|_, challenge| challenge.expires_at > now);
    }
}

fn generate_challenge() -> Result<String, rand::Error> {
    let mut bytes = [0u8; CHALLENGE_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn relying_party() -> RelyingPartyContext {
        RelyingPartyContext {
            rp_id: "localhost".to_string(),
            origin: "http://localhost:3000".to_string(),
        }
    }

    #[test]
    fn generated_challenge_is_32_url_safe_bytes() -> Result<(), rand::Error> {
        let value = generate_challenge()?;
        assert!(!value.contains('='));
        assert!(!value.contains('+'));
        assert!(!value.contains('/'));
        let decoded_len = Base64UrlUnpadded::decode_vec(&value)
            .ok()
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(CHALLENGE_BYTES));
        assert_ne!(value, generate_challenge()?);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn issue_records_context() -> Result<(), ChallengeError> {
        let store = ChallengeStore::default();
        let challenge = store.issue(
            CeremonyPurpose::Registration,
            &relying_party(),
            "alice@example.com",
            Some("user-1".to_string()),
        )?;
        assert_eq!(challenge.purpose, CeremonyPurpose::Registration);
        assert_eq!(challenge.rp_id, "localhost");
        assert_eq!(challenge.subject, "alice@example.com");
        assert_eq!(challenge.expires_at - challenge.issued_at, DEFAULT_CHALLENGE_TTL);
        assert!(!challenge.consumed);
        assert_eq!(store.len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn consume_succeeds_once() -> Result<(), ChallengeError> {
        let store = ChallengeStore::default();
        let issued = store.issue(CeremonyPurpose::Login, &relying_party(), "a@b.co", None)?;

        let consumed = store.consume(&issued.value)?;
        assert!(consumed.consumed);
        assert_eq!(consumed.value, issued.value);

        assert!(matches!(
            store.consume(&issued.value),
            Err(ChallengeError::AlreadyConsumed)
        ));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn consume_fails_after_expiry() -> Result<(), ChallengeError> {
        let store = ChallengeStore::new(Duration::from_secs(5));
        let issued = store.issue(CeremonyPurpose::Login, &relying_party(), "a@b.co", None)?;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(matches!(
            store.consume(&issued.value),
            Err(ChallengeError::Expired)
        ));
        assert!(matches!(
            store.consume(&issued.value),
            Err(ChallengeError::AlreadyConsumed)
        ));
        Ok(())
    }

    #[test]
    fn unrepresentable_ttl_issues_nothing() {
        let store = ChallengeStore::new(Duration::from_secs(u64::MAX));
        assert!(matches!(
            store.issue(CeremonyPurpose::Login, &relying_party(), "a@b.co", None),
            Err(ChallengeError::TtlOutOfRange)
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn consume_unknown_is_not_found() {
        let store = ChallengeStore::default();
        assert!(matches!(store.consume("nope"), Err(ChallengeError::NotFound)));
    }

    #[tokio::test(start_paused = true)]
    async fn prune_keeps_tombstones_until_expiry() -> Result<(), ChallengeError> {
        let store = ChallengeStore::new(Duration::from_secs(10));
        let used = store.issue(CeremonyPurpose::Login, &relying_party(), "a@b.co", None)?;
        store.consume(&used.value)?;

        tokio::time::advance(Duration::from_secs(5)).await;
        let fresh = store.issue(CeremonyPurpose::Login, &relying_party(), "a@b.co", None)?;
        store.prune();
        assert_eq!(store.len(), 2);

        tokio::time::advance(Duration::from_secs(6)).await;
        store.prune();
        assert_eq!(store.len(), 1);
        assert!(store.consume(&fresh.value).is_ok());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumes_succeed_once() -> anyhow::Result<()> {
        let store = Arc::new(ChallengeStore::default());

        for _ in 0..50 {
            let issued = store.issue(CeremonyPurpose::Login, &relying_party(), "a@b.co", None)?;
            let mut handles = Vec::new();
            for _ in 0..8 {
                let store = Arc::clone(&store);
                let value = issued.value.clone();
                handles.push(tokio::spawn(async move { store.consume(&value).is_ok() }));
            }

            let mut successes = 0;
            for handle in handles {
                if handle.await? {
                    successes += 1;
                }
            }
            assert_eq!(successes, 1);
        }
        Ok(())
    }
}
