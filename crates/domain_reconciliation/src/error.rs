//! Reconciliation error types

use thiserror::Error;

use core_kernel::{AccountId, MoneyError, PortError};
use domain_ledger::LedgerError;

/// Errors from reconciliation and external sync
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("No {system} integration for account {account_id}")]
    IntegrationMissing {
        account_id: AccountId,
        system: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Accounting system error: {0}")]
    Port(#[from] PortError),

    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl ReconciliationError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn integration_missing(account_id: AccountId, system: impl Into<String>) -> Self {
        Self::IntegrationMissing {
            account_id,
            system: system.into(),
        }
    }
}
