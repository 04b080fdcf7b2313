//! Operator-facing billing summary
//!
//! Computed fresh from store state on every call; nothing here is cached.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use core_kernel::{AccountId, InvoiceId};

use crate::error::LedgerError;
use crate::invoice::InvoiceStatus;
use crate::issue::IssueType;
use crate::store::LedgerStore;

/// Snapshot of an account's billing position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingSummary {
    /// Invoices awaiting payment or release (not DRAFT, not PAID)
    pub pending_invoices: usize,
    /// Unpaid invoices past their due date
    pub overdue_invoices: usize,
    /// Open DISPUTE issues
    pub active_disputes: usize,
    /// Amount still owed across SENT/PARTIAL/OVERDUE invoices, minor units
    pub outstanding_minor: i64,
    /// Completed payments received in the trailing 30 days, minor units
    pub payments_last_30_days_minor: i64,
}

impl BillingSummary {
    /// Computes the summary for an account at `now`
    pub async fn compute(
        store: &dyn LedgerStore,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let invoices = store.invoices(account_id).await?;
        let payments = store.payments(account_id).await?;
        let issues = store.open_issues(account_id).await?;

        let mut paid_by_invoice: HashMap<InvoiceId, i64> = HashMap::new();
        for payment in payments.iter().filter(|p| p.is_completed()) {
            if let Some(invoice_id) = payment.invoice_id {
                *paid_by_invoice.entry(invoice_id).or_insert(0) += payment.amount.minor();
            }
        }

        let today = now.date_naive();
        let mut pending_invoices = 0;
        let mut overdue_invoices = 0;
        let mut outstanding_minor = 0;

        for invoice in &invoices {
            match invoice.status {
                InvoiceStatus::Draft | InvoiceStatus::Paid => {}
                _ => pending_invoices += 1,
            }

            let owes = matches!(
                invoice.status,
                InvoiceStatus::Sent | InvoiceStatus::Partial | InvoiceStatus::Overdue
            );
            if owes {
                let paid = paid_by_invoice.get(&invoice.id).copied().unwrap_or(0);
                outstanding_minor += (invoice.total.minor() - paid).max(0);
                if invoice.is_past_due(today) {
                    overdue_invoices += 1;
                }
            }
        }

        let active_disputes = issues
            .iter()
            .filter(|i| i.issue_type == IssueType::Dispute)
            .count();

        let window_start = now - Duration::days(30);
        let payments_last_30_days_minor = payments
            .iter()
            .filter(|p| p.is_completed() && p.occurred_at >= window_start)
            .map(|p| p.amount.minor())
            .sum();

        Ok(Self {
            pending_invoices,
            overdue_invoices,
            active_disputes,
            outstanding_minor,
            payments_last_30_days_minor,
        })
    }
}
