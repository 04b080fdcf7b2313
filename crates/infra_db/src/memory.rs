//! In-memory ledger store
//!
//! Reference implementation of the store contract. Not durable; intended for
//! tests and local experiments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use core_kernel::{AccountId, InvoiceId, IssueId, JobId, PaymentId};
use domain_ledger::{
    AccountIntegration, AuditEvent, BillingIssue, Invoice, InvoiceStatus, IssueOutcome,
    LedgerError, LedgerStore, LineItem, Payment,
};

#[derive(Debug, Default)]
struct Inner {
    invoices: HashMap<InvoiceId, Invoice>,
    line_items: HashMap<InvoiceId, Vec<LineItem>>,
    payments: HashMap<PaymentId, Payment>,
    issues: HashMap<IssueId, BillingIssue>,
    integrations: Vec<AccountIntegration>,
    audit: Vec<AuditEvent>,
}

/// In-memory implementation of [`LedgerStore`]
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, LedgerError> {
        self.inner
            .read()
            .map_err(|_| LedgerError::storage("ledger store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, LedgerError> {
        self.inner
            .write()
            .map_err(|_| LedgerError::storage("ledger store lock poisoned"))
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create_invoice(
        &self,
        invoice: Invoice,
        items: Vec<LineItem>,
    ) -> Result<InvoiceId, LedgerError> {
        invoice.validate()?;
        let mut inner = self.write()?;

        if let Some(job_id) = invoice.job_id {
            let duplicate = inner
                .invoices
                .values()
                .any(|i| i.account_id == invoice.account_id && i.job_id == Some(job_id));
            if duplicate {
                return Err(LedgerError::DuplicateJobInvoice(job_id));
            }
        }

        let id = invoice.id;
        inner.line_items.insert(id, items);
        inner.invoices.insert(id, invoice);
        Ok(id)
    }

    async fn find_invoice(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<Option<Invoice>, LedgerError> {
        let inner = self.read()?;
        Ok(inner
            .invoices
            .get(&invoice_id)
            .filter(|i| i.account_id == account_id)
            .cloned())
    }

    async fn find_invoice_by_job(
        &self,
        account_id: AccountId,
        job_id: JobId,
    ) -> Result<Option<Invoice>, LedgerError> {
        let inner = self.read()?;
        Ok(inner
            .invoices
            .values()
            .find(|i| i.account_id == account_id && i.job_id == Some(job_id))
            .cloned())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> Result<(), LedgerError> {
        invoice.validate()?;
        let mut inner = self.write()?;
        match inner.invoices.get_mut(&invoice.id) {
            Some(stored) if stored.account_id == invoice.account_id => {
                *stored = invoice.clone();
                Ok(())
            }
            _ => Err(LedgerError::not_found("invoice", invoice.id)),
        }
    }

    async fn invoices(&self, account_id: AccountId) -> Result<Vec<Invoice>, LedgerError> {
        let inner = self.read()?;
        let mut invoices: Vec<Invoice> = inner
            .invoices
            .values()
            .filter(|i| i.account_id == account_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.id);
        Ok(invoices)
    }

    async fn invoices_in_status(
        &self,
        account_id: AccountId,
        statuses: &[InvoiceStatus],
    ) -> Result<Vec<Invoice>, LedgerError> {
        let invoices = self.invoices(account_id).await?;
        Ok(invoices
            .into_iter()
            .filter(|i| statuses.contains(&i.status))
            .collect())
    }

    async fn unsynced_invoices(&self, account_id: AccountId) -> Result<Vec<Invoice>, LedgerError> {
        let invoices = self.invoices(account_id).await?;
        Ok(invoices
            .into_iter()
            .filter(|i| i.status != InvoiceStatus::Draft && i.external_id.is_none())
            .collect())
    }

    async fn line_items(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<LineItem>, LedgerError> {
        let inner = self.read()?;
        let owned = inner
            .invoices
            .get(&invoice_id)
            .map(|i| i.account_id == account_id)
            .unwrap_or(false);
        if !owned {
            return Err(LedgerError::not_found("invoice", invoice_id));
        }
        Ok(inner.line_items.get(&invoice_id).cloned().unwrap_or_default())
    }

    async fn create_payment(&self, payment: Payment) -> Result<PaymentId, LedgerError> {
        let mut inner = self.write()?;

        if let Some(external_id) = &payment.external_id {
            let duplicate = inner.payments.values().any(|p| {
                p.account_id == payment.account_id && p.external_id.as_deref() == Some(external_id)
            });
            if duplicate {
                return Err(LedgerError::DuplicateExternalPayment(external_id.clone()));
            }
        }

        let id = payment.id;
        inner.payments.insert(id, payment);
        Ok(id)
    }

    async fn payments(&self, account_id: AccountId) -> Result<Vec<Payment>, LedgerError> {
        let inner = self.read()?;
        let mut payments: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| p.account_id == account_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.id);
        Ok(payments)
    }

    async fn payments_for_invoice(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<Vec<Payment>, LedgerError> {
        let payments = self.payments(account_id).await?;
        Ok(payments
            .into_iter()
            .filter(|p| p.invoice_id == Some(invoice_id))
            .collect())
    }

    async fn open_issue(&self, issue: BillingIssue) -> Result<IssueOutcome, LedgerError> {
        let mut inner = self.write()?;
        let key = issue.dedup_key();

        let existing = inner
            .issues
            .values()
            .find(|i| i.account_id == issue.account_id && i.is_open() && i.dedup_key() == key);
        if let Some(existing) = existing {
            return Ok(IssueOutcome::AlreadyOpen(existing.id));
        }

        let id = issue.id;
        inner.issues.insert(id, issue);
        Ok(IssueOutcome::Created(id))
    }

    async fn open_issues(&self, account_id: AccountId) -> Result<Vec<BillingIssue>, LedgerError> {
        let inner = self.read()?;
        let mut issues: Vec<BillingIssue> = inner
            .issues
            .values()
            .filter(|i| i.account_id == account_id && i.is_open())
            .cloned()
            .collect();
        issues.sort_by_key(|i| i.id);
        Ok(issues)
    }

    async fn resolve_issue(
        &self,
        account_id: AccountId,
        issue_id: IssueId,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        let mut inner = self.write()?;
        match inner.issues.get_mut(&issue_id) {
            Some(issue) if issue.account_id == account_id && issue.is_open() => {
                issue.resolve(now);
                Ok(())
            }
            _ => Err(LedgerError::not_found("billing issue", issue_id)),
        }
    }

    async fn integration(
        &self,
        account_id: AccountId,
        system: &str,
    ) -> Result<Option<AccountIntegration>, LedgerError> {
        let inner = self.read()?;
        Ok(inner
            .integrations
            .iter()
            .find(|i| i.account_id == account_id && i.system == system)
            .cloned())
    }

    async fn upsert_integration(
        &self,
        integration: &AccountIntegration,
    ) -> Result<(), LedgerError> {
        let mut inner = self.write()?;
        let existing = inner
            .integrations
            .iter_mut()
            .find(|i| i.account_id == integration.account_id && i.system == integration.system);
        match existing {
            Some(slot) => *slot = integration.clone(),
            None => inner.integrations.push(integration.clone()),
        }
        Ok(())
    }

    async fn append_audit(&self, event: AuditEvent) -> Result<(), LedgerError> {
        let mut inner = self.write()?;
        inner.audit.push(event);
        Ok(())
    }

    async fn audit_events(&self, account_id: AccountId) -> Result<Vec<AuditEvent>, LedgerError> {
        let inner = self.read()?;
        Ok(inner
            .audit
            .iter()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }
}
