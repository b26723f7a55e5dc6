use super::{challenge::Challenge, relying_party::RelyingPartyContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The user and credential a verified ceremony response is bound to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserBinding {
    pub user_id: String,
    pub credential_id: String,
}

#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("credential rejected: {0}")]
    Rejected(String),
    #[error("no credential verifier configured")]
    Unavailable,
}

/// Public-key verification of an authenticator response.
///
/// Implementations check the response signature, client data and authenticator
/// data against the challenge and relying party. The challenge has already been
/// consumed when this is called.
#[async_trait]
pub trait AssertionVerifier: Send + Sync {
    async fn verify_assertion(
        &self,
        credential: &serde_json::Value,
        expected_challenge: &Challenge,
        relying_party: &RelyingPartyContext,
    ) -> Result<UserBinding, VerifierError>;
}

/// Rejects every response. Installed when no verifier has been supplied so a
/// misconfigured deployment cannot authenticate anyone.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnconfiguredVerifier;

#[async_trait]
impl AssertionVerifier for UnconfiguredVerifier {
    async fn verify_assertion(
        &self,
        _credential: &serde_json::Value,
        _expected_challenge: &Challenge,
        _relying_party: &RelyingPartyContext,
    ) -> Result<UserBinding, VerifierError> {
        Err(VerifierError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webauthn::{CeremonyPurpose, ChallengeStore};

    #[tokio::test]
    async fn unconfigured_verifier_fails_closed() -> anyhow::Result<()> {
        let relying_party = RelyingPartyContext {
            rp_id: "localhost".to_string(),
            origin: "https://localhost".to_string(),
        };
        let challenge = ChallengeStore::default().issue(
            CeremonyPurpose::Login,
            &relying_party,
            "a@b.co",
            None,
        )?;
        let result = UnconfiguredVerifier
            .verify_assertion(&serde_json::json!({"id": "x"}), &challenge, &relying_party)
            .await;
        assert!(matches!(result, Err(VerifierError::Unavailable)));
        Ok(())
    }
}
