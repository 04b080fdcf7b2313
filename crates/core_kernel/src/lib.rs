//! Core Kernel - Foundational types for the billing system
//!
//! This crate provides the building blocks shared by every domain module:
//!
//! - **Money**: monetary amounts held as integer minor units (cents), with
//!   decimal conversion only at external boundaries
//! - **Identifiers**: strongly-typed UUID wrappers for domain entities
//! - **Ports**: the error type shared by external-collaborator boundaries

pub mod identifiers;
pub mod money;
pub mod ports;

pub use identifiers::{
    AccountId, AuditEventId, CustomerId, IntegrationId, InvoiceId, IssueId, JobId, PaymentId,
};
pub use money::{Currency, Money, MoneyError};
pub use ports::PortError;
