//! Inbound payment sync
//!
//! Pulls payments from the accounting system and lands them in the ledger.
//! Matching is pure computation over maps pre-loaded once per run; invoice
//! totals are accumulated during the loop and each affected invoice is
//! updated exactly once afterwards. The integration's sync marker advances
//! only after the whole batch has landed.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use core_kernel::{AccountId, InvoiceId, Money};
use domain_ledger::{AuditAction, AuditEvent, Invoice, LedgerError, Payment, PaymentMethod};

use crate::engine::ReconciliationEngine;
use crate::error::ReconciliationError;

/// Result of one inbound payment sync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentSyncReport {
    /// Payments returned by the accounting system
    pub fetched: usize,
    /// New local payments created
    pub created: usize,
    /// Payments already present locally (by external id)
    pub skipped: usize,
    /// Created payments with no resolvable invoice
    pub unmatched: usize,
    /// Invoices whose status was recomputed
    pub invoices_updated: usize,
}

impl ReconciliationEngine {
    /// Pulls external payments recorded since the last sync
    ///
    /// `since_override` narrows the pull window further; the effective window
    /// start is the later of it and the integration's last sync marker.
    pub async fn sync_payments(
        &self,
        account_id: AccountId,
        since_override: Option<DateTime<Utc>>,
    ) -> Result<PaymentSyncReport, ReconciliationError> {
        let mut integration = self.require_integration(account_id).await?;
        self.ensure_fresh_token(&mut integration).await?;

        let since = match (integration.last_synced_at, since_override) {
            (Some(marker), Some(requested)) => Some(marker.max(requested)),
            (marker, requested) => marker.or(requested),
        };
        let external = self.accounting.pull_payments(&integration, since).await?;

        // Single pre-load of local state; the matching loop touches no store
        let local_payments = self.store.payments(account_id).await?;
        let local_external_ids: HashSet<String> = local_payments
            .iter()
            .filter_map(|p| p.external_id.clone())
            .collect();
        let mut existing_paid: HashMap<InvoiceId, i64> = HashMap::new();
        for payment in local_payments {
            if let (Some(invoice_id), true) = (payment.invoice_id, payment.is_completed()) {
                *existing_paid.entry(invoice_id).or_default() += payment.amount.minor();
            }
        }
        let invoices_by_external: HashMap<String, Invoice> = self
            .store
            .invoices(account_id)
            .await?
            .into_iter()
            .filter_map(|i| i.external_id.clone().map(|ext| (ext, i)))
            .collect();

        let mut report = PaymentSyncReport {
            fetched: external.len(),
            ..Default::default()
        };
        let mut new_paid: HashMap<InvoiceId, i64> = HashMap::new();

        for incoming in &external {
            if local_external_ids.contains(&incoming.external_id) {
                report.skipped += 1;
                continue;
            }

            let currency = match incoming.currency.parse() {
                Ok(currency) => currency,
                Err(e) => {
                    warn!(
                        external_id = %incoming.external_id,
                        error = %e,
                        "skipping payment in unknown currency"
                    );
                    report.skipped += 1;
                    continue;
                }
            };
            let amount = Money::from_decimal(incoming.amount, currency)?;
            let method = incoming
                .method
                .as_deref()
                .and_then(|m| m.parse().ok())
                .unwrap_or(PaymentMethod::Online);

            let matched = incoming
                .invoice_refs
                .iter()
                .find_map(|r| invoices_by_external.get(r));

            let mut payment = Payment::new(account_id, amount, method)
                .with_external_id(incoming.external_id.clone())
                .occurred(incoming.occurred_at);
            if let Some(invoice) = matched {
                payment = payment.for_invoice(invoice.id);
            }

            match self.store.create_payment(payment).await {
                Ok(_) => {
                    report.created += 1;
                    match matched {
                        Some(invoice) => {
                            *new_paid.entry(invoice.id).or_default() += amount.minor();
                        }
                        None => report.unmatched += 1,
                    }
                }
                // Raced a concurrent run; the payment is already in
                Err(LedgerError::DuplicateExternalPayment(_)) => report.skipped += 1,
                Err(e) => return Err(e.into()),
            }
        }

        // One status update per affected invoice
        let now = Utc::now();
        for (invoice_id, delta) in &new_paid {
            if let Some(mut invoice) = self.store.find_invoice(account_id, *invoice_id).await? {
                let paid_minor = existing_paid.get(invoice_id).copied().unwrap_or(0) + delta;
                let paid = Money::from_minor(paid_minor, invoice.total.currency());
                invoice.apply_paid_total(paid, now);
                self.store.update_invoice(&invoice).await?;
                report.invoices_updated += 1;
            }
        }

        integration.mark_synced(now);
        self.store.upsert_integration(&integration).await?;

        info!(
            account_id = %account_id,
            fetched = report.fetched,
            created = report.created,
            skipped = report.skipped,
            unmatched = report.unmatched,
            invoices_updated = report.invoices_updated,
            "inbound payment sync complete"
        );
        if let Err(e) = self
            .store
            .append_audit(AuditEvent::new(
                account_id,
                AuditAction::PaymentsPulled,
                "integration",
                integration.id.to_string(),
                json!({
                    "fetched": report.fetched,
                    "created": report.created,
                    "skipped": report.skipped,
                    "unmatched": report.unmatched,
                    "invoices_updated": report.invoices_updated,
                }),
            ))
            .await
        {
            warn!(error = %e, "audit write failed, mutation stands");
        }

        Ok(report)
    }
}
