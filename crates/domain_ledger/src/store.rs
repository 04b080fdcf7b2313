//! The ledger store port
//!
//! Storage-engine-independent access to the billing ledger. All operations
//! are scoped by account, and every creating operation carries explicit
//! create-or-get semantics so that retried events never duplicate records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use core_kernel::{AccountId, InvoiceId, IssueId, JobId, PaymentId};

use crate::audit::AuditEvent;
use crate::error::LedgerError;
use crate::integration::AccountIntegration;
use crate::invoice::{Invoice, InvoiceStatus, LineItem};
use crate::issue::BillingIssue;
use crate::payment::Payment;

/// Result of an idempotent issue creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueOutcome {
    /// A new issue was created
    Created(IssueId),
    /// An open issue with the same (invoice, type, summary) key already exists
    AlreadyOpen(IssueId),
}

impl IssueOutcome {
    /// The id of the issue, new or pre-existing
    pub fn id(&self) -> IssueId {
        match self {
            IssueOutcome::Created(id) | IssueOutcome::AlreadyOpen(id) => *id,
        }
    }

    /// Returns true if a new issue was created
    pub fn created(&self) -> bool {
        matches!(self, IssueOutcome::Created(_))
    }
}

/// Account-scoped, transactional access to the billing ledger
///
/// # Idempotency contract
///
/// - `create_invoice` fails with `DuplicateJobInvoice` when the linked job
///   already has an invoice
/// - `create_payment` fails with `DuplicateExternalPayment` when the external
///   identifier is already present for the account
/// - `open_issue` returns `IssueOutcome::AlreadyOpen` instead of inserting a
///   second open issue with the same de-duplication key
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // --- Invoices -----------------------------------------------------------

    /// Persists an invoice and its line items as one logical unit
    async fn create_invoice(
        &self,
        invoice: Invoice,
        items: Vec<LineItem>,
    ) -> Result<InvoiceId, LedgerError>;

    /// Finds an invoice by id within the account scope
    async fn find_invoice(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<Option<Invoice>, LedgerError>;

    /// Finds the invoice raised for a job, if any
    async fn find_invoice_by_job(
        &self,
        account_id: AccountId,
        job_id: JobId,
    ) -> Result<Option<Invoice>, LedgerError>;

    /// Persists invoice mutations (status, paid_at, sync markers)
    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), LedgerError>;

    /// All invoices for the account
    async fn invoices(&self, account_id: AccountId) -> Result<Vec<Invoice>, LedgerError>;

    /// Invoices currently in any of the given statuses
    async fn invoices_in_status(
        &self,
        account_id: AccountId,
        statuses: &[InvoiceStatus],
    ) -> Result<Vec<Invoice>, LedgerError>;

    /// Non-draft invoices with no external identifier yet
    async fn unsynced_invoices(&self, account_id: AccountId) -> Result<Vec<Invoice>, LedgerError>;

    /// Line items of an invoice
    async fn line_items(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<LineItem>, LedgerError>;

    // --- Payments -----------------------------------------------------------

    /// Persists a payment
    async fn create_payment(&self, payment: Payment) -> Result<PaymentId, LedgerError>;

    /// All payments for the account
    async fn payments(&self, account_id: AccountId) -> Result<Vec<Payment>, LedgerError>;

    /// Payments referencing an invoice
    async fn payments_for_invoice(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, LedgerError>;

    // --- Billing issues -----------------------------------------------------

    /// Creates an issue unless an open one with the same key exists
    async fn open_issue(&self, issue: BillingIssue) -> Result<IssueOutcome, LedgerError>;

    /// All open issues for the account
    async fn open_issues(&self, account_id: AccountId) -> Result<Vec<BillingIssue>, LedgerError>;

    /// Resolves an open issue
    async fn resolve_issue(
        &self,
        account_id: AccountId,
        issue_id: IssueId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    // --- Integrations -------------------------------------------------------

    /// The integration record for (account, system), if connected
    async fn integration(
        &self,
        account_id: AccountId,
        system: &str,
    ) -> Result<Option<AccountIntegration>, LedgerError>;

    /// Creates or replaces an integration record
    async fn upsert_integration(&self, integration: &AccountIntegration)
        -> Result<(), LedgerError>;

    // --- Audit --------------------------------------------------------------

    /// Appends an audit event
    async fn append_audit(&self, event: AuditEvent) -> Result<(), LedgerError>;

    /// Audit events for the account, oldest first
    async fn audit_events(&self, account_id: AccountId) -> Result<Vec<AuditEvent>, LedgerError>;
}
