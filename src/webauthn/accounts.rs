use super::verifier::UserBinding;
use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub user_id: String,
    pub email: String,
    pub username: String,
    pub credential_ids: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("account already exists")]
    AlreadyExists,
    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

/// User and credential records, keyed by normalized email.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AccountError>;

    /// Create an account holding its first credential.
    async fn register(
        &self,
        email: &str,
        username: &str,
        binding: &UserBinding,
    ) -> Result<Account, AccountError>;
}

/// In-process account records for single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: DashMap<String, Account>,
}

impl MemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts.get(email).map(|entry| entry.value().clone()))
    }

    async fn register(
        &self,
        email: &str,
        username: &str,
        binding: &UserBinding,
    ) -> Result<Account, AccountError> {
        match self.accounts.entry(email.to_string()) {
            Entry::Occupied(_) => Err(AccountError::AlreadyExists),
            Entry::Vacant(slot) => {
                let account = Account {
                    user_id: binding.user_id.clone(),
                    email: email.to_string(),
                    username: username.to_string(),
                    credential_ids: vec![binding.credential_id.clone()],
                };
                slot.insert(account.clone());
                Ok(account)
            }
        }
    }
}
