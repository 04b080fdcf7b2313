//! Lifecycle error types

use thiserror::Error;

use core_kernel::{MoneyError, PortError};
use domain_ledger::LedgerError;

/// Errors from lifecycle orchestration
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Collaborator error: {0}")]
    Port(#[from] PortError),

    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl LifecycleError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }
}
