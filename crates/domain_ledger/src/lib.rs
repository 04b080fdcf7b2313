//! Ledger Store - the persistent, transactional record of billing state
//!
//! This crate defines the entities of the billing ledger (invoices, line
//! items, payments, billing issues, account integrations, audit events) and
//! the `LedgerStore` port through which every other component reads and
//! writes them.
//!
//! # Design rules
//!
//! - All monetary fields are integer minor units (`core_kernel::Money`)
//! - Every status is a closed enumeration with a single canonical
//!   normalization step (`as_str` / `FromStr`) applied at the storage
//!   boundary; no ad-hoc string comparison elsewhere
//! - Creating operations are idempotent: the store checks the natural key
//!   (job id, external payment id, open-issue tuple) before inserting
//! - Invoices are never deleted; they reach terminal state through payment
//!   or dispute resolution

pub mod audit;
pub mod error;
pub mod integration;
pub mod invoice;
pub mod issue;
pub mod payment;
pub mod store;
pub mod summary;

pub use audit::{AuditAction, AuditEvent};
pub use error::LedgerError;
pub use integration::{AccountIntegration, IntegrationStatus};
pub use invoice::{Invoice, InvoiceStatus, LineItem, ServiceClass};
pub use issue::{BillingIssue, IssueKey, IssueSeverity, IssueStatus, IssueType};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use store::{IssueOutcome, LedgerStore};
pub use summary::BillingSummary;
