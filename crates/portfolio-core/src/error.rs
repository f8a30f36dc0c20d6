use thiserror::Error;

use crate::AccountId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    /// The account, transaction or equity type store could not be reached.
    /// No valuation pass can proceed without it.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("No target allocation configured for equity type {0}")]
    MissingTargetAllocation(String),

    #[error("Invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl ValuationError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        ValuationError::StoreUnavailable(err.to_string())
    }

    /// Fatal errors abort the whole pass instead of degrading a single row.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ValuationError::StoreUnavailable(_) | ValuationError::MissingTargetAllocation(_)
        )
    }
}
