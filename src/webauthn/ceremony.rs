//! Passkey registration and login ceremonies.
//!
//! Flow Overview:
//! 1) `begin_*` resolves nothing itself: the caller passes the request's relying
//!    party, a challenge is issued for it and wrapped into browser options.
//! 2) The browser signs the challenge and posts the credential back together with
//!    the challenge value (carried in a cookie).
//! 3) `finish_*` consumes the challenge first, so every attempt burns it, then
//!    checks purpose, relying party and subject before handing the credential to
//!    the injected `AssertionVerifier`.
//!
//! Security boundaries:
//! - A challenge authorizes one ceremony of one purpose for one email on one
//!   relying party.
//! - A login binding must name a credential registered to the account.

use super::{
    accounts::{Account, AccountError, AccountStore},
    challenge::{CeremonyPurpose, Challenge, ChallengeError, ChallengeStore},
    options::{
        CredentialDescriptor, LoginOptions, PREFERRED, RegistrationOptions, RelyingPartyEntity,
        UserEntity,
    },
    relying_party::RelyingPartyContext,
    verifier::{AssertionVerifier, UserBinding, VerifierError},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};
use ulid::Ulid;

pub const DEFAULT_RP_NAME: &str = "Passgate";

#[derive(Debug, Error)]
pub enum CeremonyError {
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error("challenge was issued for {expected}")]
    PurposeMismatch { expected: CeremonyPurpose },
    #[error("challenge was issued for a different relying party")]
    RelyingPartyMismatch,
    #[error("challenge was issued for a different account")]
    SubjectMismatch,
    #[error("account already registered")]
    AccountExists,
    #[error("no passkeys registered for this account")]
    UnknownAccount,
    #[error("credential verification failed")]
    InvalidCredential(#[source] VerifierError),
    #[error("credential does not belong to this account")]
    CredentialMismatch,
    #[error(transparent)]
    Accounts(AccountError),
}

impl From<AccountError> for CeremonyError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::AlreadyExists => Self::AccountExists,
            other => Self::Accounts(other),
        }
    }
}

pub struct CeremonyOrchestrator {
    challenges: Arc<ChallengeStore>,
    accounts: Arc<dyn AccountStore>,
    verifier: Arc<dyn AssertionVerifier>,
    rp_name: String,
}

impl CeremonyOrchestrator {
    #[must_use]
    pub fn new(
        challenges: Arc<ChallengeStore>,
        accounts: Arc<dyn AccountStore>,
        verifier: Arc<dyn AssertionVerifier>,
        rp_name: &str,
    ) -> Self {
        Self {
            challenges,
            accounts,
            verifier,
            rp_name: rp_name.to_string(),
        }
    }

    #[must_use]
    pub fn challenges(&self) -> &ChallengeStore {
        &self.challenges
    }

    #[must_use]
    pub fn rp_name(&self) -> &str {
        &self.rp_name
    }

    fn timeout_millis(&self) -> u64 {
        u64::try_from(self.challenges.ttl().as_millis()).unwrap_or(u64::MAX)
    }

    /// Start registering a new account.
    ///
    /// # Errors
    /// `AccountExists` when the email is taken, otherwise store or RNG failures.
    pub async fn begin_registration(
        &self,
        relying_party: &RelyingPartyContext,
        email: &str,
        username: &str,
    ) -> Result<(RegistrationOptions, Challenge), CeremonyError> {
        if self.accounts.find_by_email(email).await?.is_some() {
            return Err(CeremonyError::AccountExists);
        }

        let user_handle = Ulid::new().to_string();
        let challenge = self.challenges.issue(
            CeremonyPurpose::Registration,
            relying_party,
            email,
            Some(user_handle.clone()),
        )?;

        let display_name = if username.is_empty() { email } else { username };
        let options = RegistrationOptions::new(
            challenge.value.clone(),
            RelyingPartyEntity {
                id: relying_party.rp_id.clone(),
                name: self.rp_name.clone(),
            },
            UserEntity {
                id: Base64UrlUnpadded::encode_string(user_handle.as_bytes()),
                name: email.to_string(),
                display_name: display_name.to_string(),
            },
            self.timeout_millis(),
        );
        debug!(rp_id = %relying_party.rp_id, "registration challenge issued");
        Ok((options, challenge))
    }

    /// Start a login for an existing account.
    ///
    /// # Errors
    /// `UnknownAccount` when the email has no registered passkeys.
    pub async fn begin_login(
        &self,
        relying_party: &RelyingPartyContext,
        email: &str,
    ) -> Result<(LoginOptions, Challenge), CeremonyError> {
        let account = self
            .accounts
            .find_by_email(email)
            .await?
            .filter(|account| !account.credential_ids.is_empty())
            .ok_or(CeremonyError::UnknownAccount)?;

        let challenge =
            self.challenges
                .issue(CeremonyPurpose::Login, relying_party, email, None)?;

        let options = LoginOptions {
            challenge: challenge.value.clone(),
            rp_id: relying_party.rp_id.clone(),
            timeout: self.timeout_millis(),
            user_verification: PREFERRED.to_string(),
            allow_credentials: account
                .credential_ids
                .iter()
                .map(|id| CredentialDescriptor::public_key(id))
                .collect(),
        };
        debug!(rp_id = %relying_party.rp_id, "login challenge issued");
        Ok((options, challenge))
    }

    /// Finish registration and create the account.
    ///
    /// # Errors
    /// Challenge misuse, verifier rejection, or a binding for another user handle.
    pub async fn finish_registration(
        &self,
        relying_party: &RelyingPartyContext,
        presented_challenge: &str,
        email: &str,
        username: &str,
        credential: &serde_json::Value,
    ) -> Result<Account, CeremonyError> {
        let challenge = self.consume_for(
            CeremonyPurpose::Registration,
            relying_party,
            presented_challenge,
            email,
        )?;
        let binding = self.verify(credential, &challenge, relying_party).await?;
        if challenge.user_handle.as_deref() != Some(binding.user_id.as_str()) {
            return Err(CeremonyError::CredentialMismatch);
        }

        let account = self.accounts.register(email, username, &binding).await?;
        debug!(user_id = %account.user_id, "passkey registered");
        Ok(account)
    }

    /// Finish a login for an existing account.
    ///
    /// # Errors
    /// Challenge misuse, verifier rejection, or a credential that is not the account's.
    pub async fn finish_login(
        &self,
        relying_party: &RelyingPartyContext,
        presented_challenge: &str,
        email: &str,
        credential: &serde_json::Value,
    ) -> Result<Account, CeremonyError> {
        let challenge =
            self.consume_for(CeremonyPurpose::Login, relying_party, presented_challenge, email)?;
        let account = self
            .accounts
            .find_by_email(email)
            .await?
            .ok_or(CeremonyError::UnknownAccount)?;

        let binding = self.verify(credential, &challenge, relying_party).await?;
        if binding.user_id != account.user_id
            || !account.credential_ids.contains(&binding.credential_id)
        {
            return Err(CeremonyError::CredentialMismatch);
        }
        debug!(user_id = %account.user_id, "passkey login verified");
        Ok(account)
    }

    fn consume_for(
        &self,
        purpose: CeremonyPurpose,
        relying_party: &RelyingPartyContext,
        presented: &str,
        email: &str,
    ) -> Result<Challenge, CeremonyError> {
        let challenge = self.challenges.consume(presented)?;
        if challenge.purpose != purpose {
            return Err(CeremonyError::PurposeMismatch { expected: purpose });
        }
        if challenge.rp_id != relying_party.rp_id || challenge.origin != relying_party.origin {
            return Err(CeremonyError::RelyingPartyMismatch);
        }
        if challenge.subject != email {
            return Err(CeremonyError::SubjectMismatch);
        }
        Ok(challenge)
    }

    async fn verify(
        &self,
        credential: &serde_json::Value,
        challenge: &Challenge,
        relying_party: &RelyingPartyContext,
    ) -> Result<UserBinding, CeremonyError> {
        self.verifier
            .verify_assertion(credential, challenge, relying_party)
            .await
            .map_err(|err| {
                warn!("credential rejected: {err}");
                CeremonyError::InvalidCredential(err)
            })
    }

    /// Periodically drop expired challenges.
    pub fn start_prune_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let challenges = Arc::clone(&self.challenges);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                challenges.prune();
            }
        })
    }
}

impl std::fmt::Debug for CeremonyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CeremonyOrchestrator")
            .field("rp_name", &self.rp_name)
            .field("challenge_ttl", &self.challenges.ttl())
            .finish_non_exhaustive()
    }
}
