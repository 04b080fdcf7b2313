//! Lifecycle stage inference
//!
//! The stage chain is `JOB_COMPLETED -> INVOICE_DRAFT | INVOICE_PENDING_APPROVAL
//! -> INVOICE_SENT -> PAYMENT_PENDING -> PAYMENT_RECEIVED -> ACCOUNTING_SYNCED
//! -> CLOSED`, with side branches `OVERDUE` and `DISPUTE -> REMEDIATION`. The
//! stage is never
//! stored: it is inferred from the invoice status, the recomputed paid total,
//! and whether the invoice has been synced, so re-running an operation against
//! unchanged state infers the same stage.

use serde::{Deserialize, Serialize};

use core_kernel::Money;
use domain_ledger::{Invoice, InvoiceStatus};

/// Inferred position of an invoice in the billing lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleStage {
    InvoiceDraft,
    InvoicePendingApproval,
    InvoiceSent,
    PaymentPending,
    PaymentReceived,
    AccountingSynced,
    Closed,
    Overdue,
    Dispute,
    Remediation,
}

impl LifecycleStage {
    /// Infers the stage from invoice state and the recomputed paid total
    pub fn infer(invoice: &Invoice, paid_total: Money) -> Self {
        let synced = invoice.external_id.is_some();
        match invoice.status {
            InvoiceStatus::Draft => LifecycleStage::InvoiceDraft,
            InvoiceStatus::PendingApproval => LifecycleStage::InvoicePendingApproval,
            InvoiceStatus::Disputed => LifecycleStage::Dispute,
            InvoiceStatus::Overdue => LifecycleStage::Overdue,
            InvoiceStatus::Paid => {
                if synced {
                    LifecycleStage::AccountingSynced
                } else {
                    LifecycleStage::PaymentReceived
                }
            }
            InvoiceStatus::Sent | InvoiceStatus::Partial => {
                if paid_total.is_positive() {
                    LifecycleStage::PaymentReceived
                } else if synced {
                    LifecycleStage::PaymentPending
                } else {
                    LifecycleStage::InvoiceSent
                }
            }
        }
    }

    /// The natural next stage in the chain. A dispute advances into
    /// remediation; terminal and other side-branch stages return themselves
    pub fn next(&self) -> Self {
        match self {
            LifecycleStage::InvoiceDraft | LifecycleStage::InvoicePendingApproval => {
                LifecycleStage::InvoiceSent
            }
            LifecycleStage::InvoiceSent => LifecycleStage::PaymentPending,
            LifecycleStage::PaymentPending => LifecycleStage::PaymentReceived,
            LifecycleStage::PaymentReceived => LifecycleStage::AccountingSynced,
            LifecycleStage::AccountingSynced => LifecycleStage::Closed,
            LifecycleStage::Dispute => LifecycleStage::Remediation,
            LifecycleStage::Closed | LifecycleStage::Overdue | LifecycleStage::Remediation => {
                *self
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use core_kernel::{AccountId, Currency};

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    fn invoice(status: InvoiceStatus, external_id: Option<&str>) -> Invoice {
        let mut invoice = Invoice::new(
            AccountId::new(),
            usd(10_000),
            usd(800),
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        )
        .unwrap()
        .with_status(status);
        invoice.external_id = external_id.map(String::from);
        invoice
    }

    #[test]
    fn test_draft_stages() {
        assert_eq!(
            LifecycleStage::infer(&invoice(InvoiceStatus::Draft, None), usd(0)),
            LifecycleStage::InvoiceDraft
        );
        assert_eq!(
            LifecycleStage::infer(&invoice(InvoiceStatus::PendingApproval, None), usd(0)),
            LifecycleStage::InvoicePendingApproval
        );
    }

    #[test]
    fn test_sent_progression() {
        let sent = invoice(InvoiceStatus::Sent, None);
        assert_eq!(LifecycleStage::infer(&sent, usd(0)), LifecycleStage::InvoiceSent);

        let synced = invoice(InvoiceStatus::Sent, Some("ext-1"));
        assert_eq!(LifecycleStage::infer(&synced, usd(0)), LifecycleStage::PaymentPending);
        assert_eq!(LifecycleStage::infer(&synced, usd(5_000)), LifecycleStage::PaymentReceived);
    }

    #[test]
    fn test_paid_stages() {
        let mut paid = invoice(InvoiceStatus::Paid, None);
        paid.paid_at = Some(Utc::now());
        assert_eq!(
            LifecycleStage::infer(&paid, usd(10_800)),
            LifecycleStage::PaymentReceived
        );

        paid.external_id = Some("ext-1".to_string());
        assert_eq!(
            LifecycleStage::infer(&paid, usd(10_800)),
            LifecycleStage::AccountingSynced
        );
        assert_eq!(
            LifecycleStage::infer(&paid, usd(10_800)).next(),
            LifecycleStage::Closed
        );
    }

    #[test]
    fn test_side_branches_are_sticky() {
        assert_eq!(
            LifecycleStage::infer(&invoice(InvoiceStatus::Disputed, None), usd(0)),
            LifecycleStage::Dispute
        );
        assert_eq!(LifecycleStage::Dispute.next(), LifecycleStage::Remediation);
        assert_eq!(LifecycleStage::Remediation.next(), LifecycleStage::Remediation);
        assert_eq!(LifecycleStage::Closed.next(), LifecycleStage::Closed);
    }
}
