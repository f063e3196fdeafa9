use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// The execution/step pair a pending token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStep {
    pub execution_id: String,
    pub step: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Never issued, or the token string is garbage.
    Unknown,
    /// Was valid once; already redeemed or expired.
    AlreadySpent,
}

/// Issues and redeems single-use continuation tokens.
///
/// Each token maps to exactly one pending execution/step pair and can be
/// consumed at most once, whether by redemption or by timeout expiry. Spent
/// tokens are remembered so a late or duplicate redemption is distinguishable
/// from a token that never existed.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    pending: HashMap<String, PendingStep>,
    spent: HashSet<String>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for a suspended step.
    pub fn issue(&mut self, execution_id: &str, step: usize) -> String {
        let token = Uuid::new_v4().to_string();
        self.pending.insert(
            token.clone(),
            PendingStep {
                execution_id: execution_id.to_string(),
                step,
            },
        );
        token
    }

    /// Look up the pair a token is pending for, without consuming it.
    pub fn peek(&self, token: &str) -> Result<&PendingStep, TokenError> {
        match self.pending.get(token) {
            Some(pending) => Ok(pending),
            None if self.spent.contains(token) => Err(TokenError::AlreadySpent),
            None => Err(TokenError::Unknown),
        }
    }

    /// Consume a token. At most one call per token ever succeeds.
    pub fn consume(&mut self, token: &str) -> Result<PendingStep, TokenError> {
        match self.pending.remove(token) {
            Some(pending) => {
                self.spent.insert(token.to_string());
                Ok(pending)
            }
            None if self.spent.contains(token) => Err(TokenError::AlreadySpent),
            None => Err(TokenError::Unknown),
        }
    }
}
