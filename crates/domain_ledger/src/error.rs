//! Ledger store errors

use core_kernel::{JobId, MoneyError};
use thiserror::Error;

/// Errors that can occur in the ledger store
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Entity not found within the account scope
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The job already has an invoice
    #[error("Job already invoiced: {0}")]
    DuplicateJobInvoice(JobId),

    /// A payment with this external identifier already exists for the account
    #[error("Duplicate external payment: {0}")]
    DuplicateExternalPayment(String),

    /// A stored-data invariant would be violated
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A stored status string could not be normalized
    #[error("Unknown status value: {0}")]
    UnknownStatus(String),

    /// Monetary calculation failed
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    /// The storage backend failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound { entity, id: id.to_string() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage(message.into())
    }
}
