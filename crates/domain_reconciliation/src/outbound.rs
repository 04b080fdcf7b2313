//! Outbound invoice sync
//!
//! Pushes local invoices to the accounting system. A push failure is never
//! silently dropped and never retried inline: it opens a HIGH sync-error
//! issue and is reported as a failed outcome for a later scheduled run.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use core_kernel::{AccountId, InvoiceId, IssueId};
use domain_ledger::{
    AuditAction, AuditEvent, BillingIssue, Invoice, InvoiceStatus, IssueSeverity, IssueType,
    LineItem,
};

use crate::accounting::{ExternalInvoice, ExternalLine};
use crate::engine::ReconciliationEngine;
use crate::error::ReconciliationError;

/// Outcome of syncing one invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SyncOutcome {
    /// Pushed; the invoice now carries this external id
    Synced { external_id: String },
    /// Not eligible (draft, or already synced)
    Skipped { reason: String },
    /// Push failed; a sync-error issue was opened
    Failed { issue_id: IssueId },
}

/// Result of [`ReconciliationEngine::sync_invoice`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceSyncResult {
    pub invoice_id: InvoiceId,
    pub outcome: SyncOutcome,
}

/// Result of [`ReconciliationEngine::sync_pending_invoices`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchSyncReport {
    pub total: usize,
    pub synced: usize,
    pub errored: usize,
}

impl ReconciliationEngine {
    /// Pushes one invoice to the accounting system
    ///
    /// Eligible invoices are non-draft and not yet synced; anything else is
    /// reported as skipped, not an error.
    pub async fn sync_invoice(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceSyncResult, ReconciliationError> {
        let mut invoice = self
            .store
            .find_invoice(account_id, invoice_id)
            .await?
            .ok_or_else(|| ReconciliationError::not_found("invoice", invoice_id))?;

        if invoice.external_id.is_some() {
            return Ok(InvoiceSyncResult {
                invoice_id,
                outcome: SyncOutcome::Skipped {
                    reason: "already synced".to_string(),
                },
            });
        }
        if invoice.status == InvoiceStatus::Draft {
            return Ok(InvoiceSyncResult {
                invoice_id,
                outcome: SyncOutcome::Skipped {
                    reason: "draft invoices are not synced".to_string(),
                },
            });
        }

        let integration = self.require_integration(account_id).await?;
        let items = self.store.line_items(account_id, invoice_id).await?;
        let external = build_external_invoice(&invoice, &items);

        match self.accounting.push_invoice(&integration, &external).await {
            Ok(external_id) => {
                let now = Utc::now();
                invoice.mark_synced(external_id.clone(), now);
                self.store.update_invoice(&invoice).await?;

                info!(invoice_id = %invoice_id, external_id = %external_id, "invoice synced");
                if let Err(e) = self
                    .store
                    .append_audit(AuditEvent::new(
                        account_id,
                        AuditAction::InvoiceSynced,
                        "invoice",
                        invoice_id.to_string(),
                        json!({ "external_id": external_id }),
                    ))
                    .await
                {
                    tracing::warn!(error = %e, "audit write failed, mutation stands");
                }

                Ok(InvoiceSyncResult {
                    invoice_id,
                    outcome: SyncOutcome::Synced { external_id },
                })
            }
            Err(e) => {
                error!(invoice_id = %invoice_id, error = %e, "invoice sync failed");
                let outcome = self
                    .store
                    .open_issue(
                        BillingIssue::new(
                            account_id,
                            IssueType::SyncError,
                            IssueSeverity::High,
                            format!("Failed to sync invoice {}", invoice_id),
                        )
                        .with_invoice(invoice_id)
                        .with_detail(json!({ "error": e.to_string() })),
                    )
                    .await?;

                Ok(InvoiceSyncResult {
                    invoice_id,
                    outcome: SyncOutcome::Failed {
                        issue_id: outcome.id(),
                    },
                })
            }
        }
    }

    /// Pushes every unsynced non-draft invoice for the account
    ///
    /// Iterations are independent; one failed push does not stop the batch.
    pub async fn sync_pending_invoices(
        &self,
        account_id: AccountId,
    ) -> Result<BatchSyncReport, ReconciliationError> {
        let pending = self.store.unsynced_invoices(account_id).await?;
        let mut report = BatchSyncReport {
            total: pending.len(),
            ..Default::default()
        };

        for invoice in pending {
            match self.sync_invoice(account_id, invoice.id).await?.outcome {
                SyncOutcome::Synced { .. } => report.synced += 1,
                SyncOutcome::Failed { .. } => report.errored += 1,
                SyncOutcome::Skipped { .. } => {}
            }
        }

        info!(
            account_id = %account_id,
            total = report.total,
            synced = report.synced,
            errored = report.errored,
            "outbound sync batch complete"
        );
        Ok(report)
    }
}

fn build_external_invoice(invoice: &Invoice, items: &[LineItem]) -> ExternalInvoice {
    ExternalInvoice {
        invoice_ref: invoice.id.to_string(),
        customer_ref: invoice.customer_id.map(|c| c.to_string()),
        issue_date: invoice.created_at.date_naive(),
        due_date: invoice.due_date,
        currency: invoice.total.currency().code().to_string(),
        subtotal: invoice.subtotal.to_decimal(),
        tax: invoice.tax.to_decimal(),
        total: invoice.total.to_decimal(),
        lines: items
            .iter()
            .map(|item| ExternalLine {
                description: item.description.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price.to_decimal(),
                amount: item.amount.to_decimal(),
            })
            .collect(),
    }
}
