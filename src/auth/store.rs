//! Credential lookup

use std::collections::HashMap;

use axum::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use super::session::StoredUser;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    #[error("credential store unavailable: {0}")]
    Backend(String),
}

/// Maps a username to its stored credentials
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn user(&self, username: &str) -> Result<StoredUser, StoreError>;
}

/// In-memory store loaded from the `users` configuration table
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialStore {
    users: HashMap<String, StoredUser>,
}

impl StaticCredentialStore {
    pub fn new(users: HashMap<String, String>) -> Self {
        Self {
            users: users
                .into_iter()
                .map(|(username, password)| (username, StoredUser { password }))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn user(&self, username: &str) -> Result<StoredUser, StoreError> {
        self.users.get(username).cloned().ok_or(StoreError::NotFound)
    }
}

/// Compare a stored password with a supplied one in constant time
///
/// Both sides are MACed under a fixed key and the tags compared with
/// `verify_slice`, so the comparison time depends on neither the content
/// nor the length of the inputs.
pub fn passwords_match(stored: &str, supplied: &str) -> bool {
    type HmacSha256 = Hmac<Sha256>;
    const COMPARE_KEY: &[u8] = b"sessiongate/password-compare";

    let Ok(mut expected) = HmacSha256::new_from_slice(COMPARE_KEY) else {
        return false;
    };
    expected.update(stored.as_bytes());
    let expected = expected.finalize().into_bytes();

    let Ok(mut actual) = HmacSha256::new_from_slice(COMPARE_KEY) else {
        return false;
    };
    actual.update(supplied.as_bytes());
    actual.verify_slice(&expected).is_ok()
}
