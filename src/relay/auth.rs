//! Token checks for `authenticate`
//!
//! Token issuance lives outside the relay. The relay only asks a verifier
//! whether a presented token may be attached to a connection.

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Token must not be empty")]
    EmptyToken,
    #[error("Token rejected for user {0}")]
    Rejected(String),
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, user_id: &str, token: &str) -> Result<(), AuthError>;
}

/// Accepts tokens on a fixed list; an empty list accepts any non-empty token
#[derive(Debug, Clone, Default)]
pub struct TokenAllowList {
    tokens: HashSet<String>,
}

impl TokenAllowList {
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self {
            tokens: tokens.into_iter().filter(|t| !t.is_empty()).collect(),
        }
    }

    /// True when any non-empty token is accepted
    pub fn is_open(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenVerifier for TokenAllowList {
    async fn verify(&self, user_id: &str, token: &str) -> Result<(), AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::EmptyToken);
        }
        if self.is_open() || self.tokens.contains(token) {
            Ok(())
        } else {
            Err(AuthError::Rejected(user_id.to_string()))
        }
    }
}
