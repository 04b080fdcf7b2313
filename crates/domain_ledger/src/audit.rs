//! Audit records for state-changing operations
//!
//! Every state-changing success writes one audit event. Audit writes are
//! tolerated to fail: the business mutation is the source of truth, so a
//! failed append is logged by the caller and never rolled back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use core_kernel::{AccountId, AuditEventId};

/// Actions recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    InvoiceCreated,
    PaymentRecorded,
    StatusChanged,
    DisputeOpened,
    InvoiceSynced,
    PaymentsPulled,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::InvoiceCreated => "INVOICE_CREATED",
            AuditAction::PaymentRecorded => "PAYMENT_RECORDED",
            AuditAction::StatusChanged => "STATUS_CHANGED",
            AuditAction::DisputeOpened => "DISPUTE_OPENED",
            AuditAction::InvoiceSynced => "INVOICE_SYNCED",
            AuditAction::PaymentsPulled => "PAYMENTS_PULLED",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = crate::error::LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "INVOICE_CREATED" => Ok(AuditAction::InvoiceCreated),
            "PAYMENT_RECORDED" => Ok(AuditAction::PaymentRecorded),
            "STATUS_CHANGED" => Ok(AuditAction::StatusChanged),
            "DISPUTE_OPENED" => Ok(AuditAction::DisputeOpened),
            "INVOICE_SYNCED" => Ok(AuditAction::InvoiceSynced),
            "PAYMENTS_PULLED" => Ok(AuditAction::PaymentsPulled),
            other => Err(crate::error::LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// An append-only audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique identifier
    pub id: AuditEventId,
    /// Owning account
    pub account_id: AccountId,
    /// What happened
    pub action: AuditAction,
    /// Kind of the affected entity ("invoice", "payment", ...)
    pub entity_kind: String,
    /// Display id of the affected entity
    pub entity_id: String,
    /// Structured context
    pub detail: Value,
    /// When the event was recorded
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Creates a new audit event
    pub fn new(
        account_id: AccountId,
        action: AuditAction,
        entity_kind: impl Into<String>,
        entity_id: impl Into<String>,
        detail: Value,
    ) -> Self {
        Self {
            id: AuditEventId::new_v7(),
            account_id,
            action,
            entity_kind: entity_kind.into(),
            entity_id: entity_id.into(),
            detail,
            created_at: Utc::now(),
        }
    }
}
