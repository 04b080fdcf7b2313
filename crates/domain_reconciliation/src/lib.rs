//! Reconciliation and external accounting sync
//!
//! Three concerns over one engine: internal reconciliation (stored status vs
//! recomputed payment totals), outbound invoice push, and inbound payment
//! pull. All of it is account-scoped and safe to re-run; correctness across
//! repeated and overlapping runs comes from the ledger store's idempotency
//! contract, not from locking.

pub mod accounting;
pub mod config;
pub mod engine;
pub mod error;
pub mod inbound;
pub mod internal;
pub mod outbound;

pub use accounting::{
    AccountingPort, ExternalInvoice, ExternalLine, ExternalPayment, TokenRefresh,
};
pub use config::ReconciliationConfig;
pub use engine::ReconciliationEngine;
pub use error::ReconciliationError;
pub use inbound::PaymentSyncReport;
pub use internal::{ReconcileReport, VarianceFinding};
pub use outbound::{BatchSyncReport, InvoiceSyncResult, SyncOutcome};
