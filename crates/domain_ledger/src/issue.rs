//! Billing issues - the operator-visible queue of findings
//!
//! Issues are created by the lifecycle orchestrator and the reconciliation
//! engine and are closed only by explicit resolution. At most one **open**
//! issue may exist per (invoice, type, summary) tuple; the store enforces
//! this through [`crate::store::LedgerStore::open_issue`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use core_kernel::{AccountId, InvoiceId, IssueId};

use crate::error::LedgerError;

/// Issue type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueType {
    /// Stored status disagrees with recomputed payment totals
    Variance,
    /// Paid total exceeds the invoice total
    Overpayment,
    /// An external sync call failed
    SyncError,
    /// A duplicate record was detected
    Duplicate,
    /// The external system reports a payment the ledger is missing
    MissingPayment,
    /// Invoice past due
    Overdue,
    /// Customer dispute
    Dispute,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Variance => "VARIANCE",
            IssueType::Overpayment => "OVERPAYMENT",
            IssueType::SyncError => "SYNC_ERROR",
            IssueType::Duplicate => "DUPLICATE",
            IssueType::MissingPayment => "MISSING_PAYMENT",
            IssueType::Overdue => "OVERDUE",
            IssueType::Dispute => "DISPUTE",
        }
    }
}

impl FromStr for IssueType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VARIANCE" => Ok(IssueType::Variance),
            "OVERPAYMENT" => Ok(IssueType::Overpayment),
            "SYNC_ERROR" => Ok(IssueType::SyncError),
            "DUPLICATE" => Ok(IssueType::Duplicate),
            "MISSING_PAYMENT" => Ok(IssueType::MissingPayment),
            "OVERDUE" => Ok(IssueType::Overdue),
            "DISPUTE" => Ok(IssueType::Dispute),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// Issue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueSeverity {
    Low,
    Medium,
    High,
}

impl IssueSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueSeverity::Low => "LOW",
            IssueSeverity::Medium => "MEDIUM",
            IssueSeverity::High => "HIGH",
        }
    }
}

impl FromStr for IssueSeverity {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(IssueSeverity::Low),
            "MEDIUM" | "MED" => Ok(IssueSeverity::Medium),
            "HIGH" => Ok(IssueSeverity::High),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// Issue status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Open,
    Resolved,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "OPEN",
            IssueStatus::Resolved => "RESOLVED",
        }
    }
}

impl FromStr for IssueStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(IssueStatus::Open),
            "RESOLVED" => Ok(IssueStatus::Resolved),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// De-duplication key for open issues
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueKey {
    pub invoice_id: Option<InvoiceId>,
    pub issue_type: IssueType,
    pub summary: String,
}

/// A persisted, operator-visible finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingIssue {
    /// Unique identifier
    pub id: IssueId,
    /// Owning account
    pub account_id: AccountId,
    /// Related invoice, if any
    pub invoice_id: Option<InvoiceId>,
    /// Issue type
    pub issue_type: IssueType,
    /// Severity
    pub severity: IssueSeverity,
    /// Status
    pub status: IssueStatus,
    /// Human-readable summary; part of the de-duplication key
    pub summary: String,
    /// Structured detail payload
    pub detail: Value,
    /// When the issue was resolved
    pub resolved_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl BillingIssue {
    /// Creates a new open issue
    pub fn new(
        account_id: AccountId,
        issue_type: IssueType,
        severity: IssueSeverity,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: IssueId::new_v7(),
            account_id,
            invoice_id: None,
            issue_type,
            severity,
            status: IssueStatus::Open,
            summary: summary.into(),
            detail: Value::Null,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    /// Links the related invoice
    pub fn with_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    /// Attaches a structured detail payload
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    /// The key the store de-duplicates open issues on
    pub fn dedup_key(&self) -> IssueKey {
        IssueKey {
            invoice_id: self.invoice_id,
            issue_type: self.issue_type,
            summary: self.summary.clone(),
        }
    }

    /// Marks the issue resolved
    pub fn resolve(&mut self, now: DateTime<Utc>) {
        self.status = IssueStatus::Resolved;
        self.resolved_at = Some(now);
    }

    /// Returns true if the issue is still open
    pub fn is_open(&self) -> bool {
        self.status == IssueStatus::Open
    }
}
