//! Account storage and password checking

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A registered user. The user name is the id.
#[derive(Debug, Clone)]
pub struct Account {
    user_name: String,
    salt: [u8; 16],
    password_digest: String,
    when_created: DateTime<Utc>,
}

impl Account {
    pub fn new(user_name: impl Into<String>, password: &str) -> Self {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);
        Self {
            user_name: user_name.into(),
            password_digest: digest(&salt, password),
            salt,
            when_created: Utc::now(),
        }
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn check_password(&self, password: &str) -> bool {
        digest(&self.salt, password) == self.password_digest
    }

    /// Public view, without credentials
    pub fn info(&self) -> AccountInfo {
        AccountInfo {
            user_name: self.user_name.clone(),
            when_created: self.when_created,
        }
    }
}

/// Account details safe to expose
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub user_name: String,
    pub when_created: DateTime<Utc>,
}

fn digest(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Account already present: {0}")]
    AlreadyPresent(String),

    #[error("Account not found: {0}")]
    NotFound(String),
}

/// Storage for accounts, keyed by user name
pub trait AccountRepository: Send + Sync {
    /// Store a new account, refusing to replace an existing user name
    fn add_account(&self, account: Account) -> Result<(), AccountError>;

    fn is_present(&self, user_name: &str) -> bool;

    fn get_account(&self, user_name: &str) -> Result<Account, AccountError>;

    /// True only when the user exists and the password matches
    fn is_valid(&self, user_name: &str, password: &str) -> bool;
}

/// In-memory account store
#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: DashMap<String, Account>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountRepository for InMemoryAccountRepository {
    fn add_account(&self, account: Account) -> Result<(), AccountError> {
        match self.accounts.entry(account.user_name().to_string()) {
            Entry::Occupied(entry) => Err(AccountError::AlreadyPresent(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(account);
                Ok(())
            }
        }
    }

    fn is_present(&self, user_name: &str) -> bool {
        self.accounts.contains_key(user_name)
    }

    fn get_account(&self, user_name: &str) -> Result<Account, AccountError> {
        self.accounts
            .get(user_name)
            .map(|a| a.value().clone())
            .ok_or_else(|| AccountError::NotFound(user_name.to_string()))
    }

    fn is_valid(&self, user_name: &str, password: &str) -> bool {
        self.accounts
            .get(user_name)
            .map(|a| a.check_password(password))
            .unwrap_or(false)
    }
}
