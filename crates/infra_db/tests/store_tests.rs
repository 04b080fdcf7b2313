//! Store contract tests against the in-memory reference implementation

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::json;

use core_kernel::{AccountId, Currency, IssueId, JobId, Money};
use domain_ledger::{
    BillingIssue, BillingSummary, InvoiceStatus, IssueSeverity, IssueType, LedgerError,
    LedgerStore, LineItem,
};
use infra_db::MemoryLedgerStore;
use test_utils::{connected_integration, init_tracing, InvoiceBuilder, PaymentBuilder};

fn usd(minor: i64) -> Money {
    Money::from_minor(minor, Currency::USD)
}

fn store() -> MemoryLedgerStore {
    init_tracing();
    MemoryLedgerStore::new()
}

// ============================================================================
// Invoice Idempotency Tests
// ============================================================================

mod invoice_tests {
    use super::*;

    #[tokio::test]
    async fn test_one_invoice_per_job() {
        let store = store();
        let account = AccountId::new();
        let job_id = JobId::new();

        let first = InvoiceBuilder::new(account).with_job(job_id).build();
        let second = InvoiceBuilder::new(account).with_job(job_id).build();

        store.create_invoice(first, vec![]).await.unwrap();
        let result = store.create_invoice(second, vec![]).await;
        assert!(matches!(result, Err(LedgerError::DuplicateJobInvoice(id)) if id == job_id));

        // A different account may invoice its own job with the same id
        let other = AccountId::new();
        let foreign = InvoiceBuilder::new(other).with_job(job_id).build();
        assert!(store.create_invoice(foreign, vec![]).await.is_ok());
    }

    #[tokio::test]
    async fn test_invoice_and_items_written_together() {
        let store = store();
        let account = AccountId::new();
        let invoice = InvoiceBuilder::new(account)
            .with_amounts(usd(10_000), usd(800))
            .build();
        let item = LineItem::new(invoice.id, "Labor", dec!(2.5), usd(4_000)).unwrap();

        let invoice_id = store.create_invoice(invoice, vec![item]).await.unwrap();

        let items = store.line_items(account, invoice_id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, usd(10_000));
    }

    #[tokio::test]
    async fn test_invalid_totals_rejected_at_the_boundary() {
        let store = store();
        let account = AccountId::new();
        let mut invoice = InvoiceBuilder::new(account).build();
        invoice.total = usd(99);

        let result = store.create_invoice(invoice, vec![]).await;
        assert!(matches!(result, Err(LedgerError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn test_account_scoping() {
        let store = store();
        let account = AccountId::new();
        let stranger = AccountId::new();
        let invoice = InvoiceBuilder::new(account).build();
        store.create_invoice(invoice.clone(), vec![]).await.unwrap();

        assert!(store
            .find_invoice(stranger, invoice.id)
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            store.line_items(stranger, invoice.id).await,
            Err(LedgerError::NotFound { .. })
        ));
        assert!(store.invoices(stranger).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unsynced_filter_excludes_drafts_and_synced() {
        let store = store();
        let account = AccountId::new();

        let draft = InvoiceBuilder::new(account)
            .with_status(InvoiceStatus::Draft)
            .build();
        let synced = InvoiceBuilder::new(account)
            .with_external_id("books-1")
            .build();
        let eligible = InvoiceBuilder::new(account).build();
        for invoice in [draft, synced, eligible.clone()] {
            store.create_invoice(invoice, vec![]).await.unwrap();
        }

        let unsynced = store.unsynced_invoices(account).await.unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].id, eligible.id);
    }
}

// ============================================================================
// Payment Idempotency Tests
// ============================================================================

mod payment_tests {
    use super::*;

    #[tokio::test]
    async fn test_external_id_unique_per_account() {
        let store = store();
        let account = AccountId::new();

        let first = PaymentBuilder::new(account)
            .with_external_id("books-pay-9")
            .build();
        let duplicate = PaymentBuilder::new(account)
            .with_external_id("books-pay-9")
            .build();

        store.create_payment(first).await.unwrap();
        let result = store.create_payment(duplicate).await;
        assert!(matches!(
            result,
            Err(LedgerError::DuplicateExternalPayment(id)) if id == "books-pay-9"
        ));

        // Another account may reuse the same external id
        let other = AccountId::new();
        let foreign = PaymentBuilder::new(other)
            .with_external_id("books-pay-9")
            .build();
        assert!(store.create_payment(foreign).await.is_ok());
    }

    #[tokio::test]
    async fn test_payments_without_external_id_never_collide() {
        let store = store();
        let account = AccountId::new();

        store
            .create_payment(PaymentBuilder::new(account).build())
            .await
            .unwrap();
        store
            .create_payment(PaymentBuilder::new(account).build())
            .await
            .unwrap();

        assert_eq!(store.payments(account).await.unwrap().len(), 2);
    }
}

// ============================================================================
// Issue De-duplication Tests
// ============================================================================

mod issue_tests {
    use super::*;

    fn variance(account: AccountId, invoice: &domain_ledger::Invoice) -> BillingIssue {
        BillingIssue::new(
            account,
            IssueType::Variance,
            IssueSeverity::High,
            "Totals disagree",
        )
        .with_invoice(invoice.id)
    }

    #[tokio::test]
    async fn test_open_issue_deduplicates_on_key() {
        let store = store();
        let account = AccountId::new();
        let invoice = InvoiceBuilder::new(account).build();
        store.create_invoice(invoice.clone(), vec![]).await.unwrap();

        let first = store
            .open_issue(variance(account, &invoice))
            .await
            .unwrap();
        assert!(first.created());

        let second = store
            .open_issue(variance(account, &invoice))
            .await
            .unwrap();
        assert!(!second.created());
        assert_eq!(first.id(), second.id());
        assert_eq!(store.open_issues(account).await.unwrap().len(), 1);

        // A different summary is a different key
        let other = store
            .open_issue(
                BillingIssue::new(
                    account,
                    IssueType::Variance,
                    IssueSeverity::High,
                    "Another discrepancy",
                )
                .with_invoice(invoice.id),
            )
            .await
            .unwrap();
        assert!(other.created());
    }

    #[tokio::test]
    async fn test_resolution_reopens_the_key() {
        let store = store();
        let account = AccountId::new();
        let issue = BillingIssue::new(
            account,
            IssueType::SyncError,
            IssueSeverity::High,
            "Failed to sync",
        )
        .with_detail(json!({"error": "connection refused"}));
        let key_copy = issue.clone();

        let first = store.open_issue(issue).await.unwrap();
        store
            .resolve_issue(account, first.id(), Utc::now())
            .await
            .unwrap();
        assert!(store.open_issues(account).await.unwrap().is_empty());

        // Once resolved, the same key may open a fresh issue
        let reopened = store
            .open_issue(BillingIssue::new(
                key_copy.account_id,
                key_copy.issue_type,
                key_copy.severity,
                key_copy.summary.clone(),
            ))
            .await
            .unwrap();
        assert!(reopened.created());
        assert_ne!(reopened.id(), first.id());
    }

    #[tokio::test]
    async fn test_resolving_unknown_issue_fails() {
        let store = store();
        let result = store
            .resolve_issue(AccountId::new(), IssueId::new(), Utc::now())
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound { .. })));
    }
}

// ============================================================================
// Integration Row Tests
// ============================================================================

mod integration_tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let store = store();
        let account = AccountId::new();
        let mut integration = connected_integration(account);
        store.upsert_integration(&integration).await.unwrap();

        integration.access_token = "rotated".to_string();
        store.upsert_integration(&integration).await.unwrap();

        let stored = store.integration(account, "books").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "rotated");
        assert!(store.integration(account, "ledgerly").await.unwrap().is_none());
    }
}

// ============================================================================
// Summary Tests
// ============================================================================

mod summary_tests {
    use super::*;

    #[tokio::test]
    async fn test_summary_reflects_store_state() {
        let store = store();
        let account = AccountId::new();
        let now = Utc::now();
        let today = now.date_naive();

        // Sent, 150.00 total, 50.00 received -> 100.00 outstanding
        let open_invoice = InvoiceBuilder::new(account)
            .with_due_date(today + Duration::days(10))
            .build();
        // Sent and past due
        let overdue_invoice = InvoiceBuilder::new(account)
            .with_due_date(today - Duration::days(3))
            .build();
        // Paid and draft invoices stay out of the pending count
        let paid_invoice = InvoiceBuilder::new(account)
            .with_status(InvoiceStatus::Paid)
            .build();
        let draft_invoice = InvoiceBuilder::new(account)
            .with_status(InvoiceStatus::Draft)
            .build();
        for invoice in [
            open_invoice.clone(),
            overdue_invoice.clone(),
            paid_invoice,
            draft_invoice,
        ] {
            store.create_invoice(invoice, vec![]).await.unwrap();
        }

        store
            .create_payment(
                PaymentBuilder::new(account)
                    .for_invoice(open_invoice.id)
                    .with_amount(usd(5_000))
                    .build(),
            )
            .await
            .unwrap();
        // Old payment falls outside the trailing window
        store
            .create_payment(
                PaymentBuilder::new(account)
                    .with_amount(usd(9_999))
                    .occurred(now - Duration::days(40))
                    .build(),
            )
            .await
            .unwrap();

        store
            .open_issue(
                BillingIssue::new(
                    account,
                    IssueType::Dispute,
                    IssueSeverity::High,
                    "Customer dispute",
                )
                .with_invoice(overdue_invoice.id),
            )
            .await
            .unwrap();

        let summary = BillingSummary::compute(&store, account, now).await.unwrap();
        assert_eq!(summary.pending_invoices, 2);
        assert_eq!(summary.overdue_invoices, 1);
        assert_eq!(summary.active_disputes, 1);
        // 10000 open on the first invoice plus the full 15000 on the overdue one
        assert_eq!(summary.outstanding_minor, 25_000);
        assert_eq!(summary.payments_last_30_days_minor, 5_000);
    }
}
