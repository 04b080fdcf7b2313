//! Internal reconciliation
//!
//! Recomputes paid totals from completed payments and compares them against
//! stored invoice statuses. Only HIGH findings are persisted as issues (via
//! the store's open-issue de-duplication); lower severities are reported in
//! the result only, so repeated runs over unchanged data open nothing new.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use core_kernel::{AccountId, InvoiceId};
use domain_ledger::{BillingIssue, InvoiceStatus, IssueSeverity, IssueType};

use crate::engine::ReconciliationEngine;
use crate::error::ReconciliationError;

/// One variance detected between stored status and recomputed totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceFinding {
    pub invoice_id: InvoiceId,
    pub severity: IssueSeverity,
    pub summary: String,
    pub paid_minor: i64,
    pub owed_minor: i64,
}

/// Result of one internal reconciliation pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Invoices examined
    pub examined: usize,
    /// Every finding, persisted or not
    pub findings: Vec<VarianceFinding>,
    /// HIGH findings that opened a new issue this run
    pub issues_opened: usize,
}

impl ReconciliationEngine {
    /// Reconciles every invoice in a payment-relevant status
    pub async fn reconcile_account(
        &self,
        account_id: AccountId,
        today: NaiveDate,
    ) -> Result<ReconcileReport, ReconciliationError> {
        let invoices = self
            .store
            .invoices_in_status(
                account_id,
                &[
                    InvoiceStatus::Sent,
                    InvoiceStatus::Partial,
                    InvoiceStatus::Overdue,
                    InvoiceStatus::Paid,
                ],
            )
            .await?;

        // One payments load for the whole pass
        let mut paid_by_invoice: HashMap<InvoiceId, i64> = HashMap::new();
        for payment in self.store.payments(account_id).await? {
            if let Some(invoice_id) = payment.invoice_id {
                if payment.is_completed() {
                    *paid_by_invoice.entry(invoice_id).or_default() += payment.amount.minor();
                }
            }
        }

        let mut report = ReconcileReport {
            examined: invoices.len(),
            ..Default::default()
        };

        for invoice in &invoices {
            let paid = paid_by_invoice.get(&invoice.id).copied().unwrap_or(0);
            let owed = invoice.total.minor() - paid;

            if invoice.status == InvoiceStatus::Paid && owed > 0 {
                report.findings.push(VarianceFinding {
                    invoice_id: invoice.id,
                    severity: IssueSeverity::High,
                    summary: format!(
                        "Invoice {} marked paid with {} minor units still owed",
                        invoice.id, owed
                    ),
                    paid_minor: paid,
                    owed_minor: owed,
                });
            }
            if invoice.status != InvoiceStatus::Paid && owed <= 0 && invoice.total.is_positive() {
                report.findings.push(VarianceFinding {
                    invoice_id: invoice.id,
                    severity: IssueSeverity::Medium,
                    summary: format!(
                        "Invoice {} fully covered by payments but not marked paid",
                        invoice.id
                    ),
                    paid_minor: paid,
                    owed_minor: owed,
                });
            }
            if invoice.status == InvoiceStatus::Sent && paid > 0 && owed > 0 {
                report.findings.push(VarianceFinding {
                    invoice_id: invoice.id,
                    severity: IssueSeverity::Low,
                    summary: format!(
                        "Invoice {} has a partial payment but is still marked sent",
                        invoice.id
                    ),
                    paid_minor: paid,
                    owed_minor: owed,
                });
            }
            if invoice.status == InvoiceStatus::Sent && invoice.is_past_due(today) {
                report.findings.push(VarianceFinding {
                    invoice_id: invoice.id,
                    severity: IssueSeverity::Medium,
                    summary: format!("Invoice {} past due while still marked sent", invoice.id),
                    paid_minor: paid,
                    owed_minor: owed,
                });
            }
        }

        for finding in &report.findings {
            if finding.severity != IssueSeverity::High {
                continue;
            }
            let outcome = self
                .store
                .open_issue(
                    BillingIssue::new(
                        account_id,
                        IssueType::Variance,
                        IssueSeverity::High,
                        finding.summary.clone(),
                    )
                    .with_invoice(finding.invoice_id)
                    .with_detail(json!({
                        "paid_minor": finding.paid_minor,
                        "owed_minor": finding.owed_minor,
                    })),
                )
                .await?;
            if outcome.created() {
                report.issues_opened += 1;
            }
        }

        info!(
            account_id = %account_id,
            examined = report.examined,
            findings = report.findings.len(),
            issues_opened = report.issues_opened,
            "internal reconciliation complete"
        );
        Ok(report)
    }
}
