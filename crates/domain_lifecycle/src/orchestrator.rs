//! Billing lifecycle orchestrator
//!
//! Drives an invoice from job completion through payment. Every operation is
//! safe to re-run against the same inputs: creates are guarded by existence
//! checks (and backstopped by the store's idempotency contract), and derived
//! state is recomputed from stored data rather than cached.
//!
//! Each successful operation appends one audit event. An audit-write failure
//! is logged and tolerated; the business mutation is never rolled back.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde_json::json;
use tracing::{info, warn};

use core_kernel::{AccountId, InvoiceId, IssueId, JobId, Money, PaymentId};
use domain_ledger::{
    AuditAction, AuditEvent, BillingIssue, Invoice, InvoiceStatus, IssueSeverity, IssueType,
    LedgerError, LedgerStore, LineItem, Payment, PaymentMethod,
};

use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::job::JobPort;
use crate::stage::LifecycleStage;
use crate::suggest::{SuggestedLine, SuggestionPort, SuggestionRequest};

/// Outcome of [`BillingOrchestrator::handle_job_completed`]
#[derive(Debug, Clone)]
pub struct JobBillingOutcome {
    pub invoice_id: InvoiceId,
    pub stage: LifecycleStage,
    /// False when the job already had an invoice
    pub created: bool,
}

/// Outcome of [`BillingOrchestrator::handle_payment_received`]
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment_id: PaymentId,
    pub invoice_status: InvoiceStatus,
    /// Recomputed completed-payment total
    pub paid_total: Money,
    /// Set when the paid total exceeds the invoice total
    pub overpayment_issue: Option<IssueId>,
}

/// Outcome of [`BillingOrchestrator::check_overdue_invoices`]
#[derive(Debug, Clone)]
pub struct OverdueSweep {
    /// Sent invoices examined
    pub examined: usize,
    /// Invoices that received a new overdue issue this run
    pub flagged: Vec<InvoiceId>,
}

/// Orchestrates the billing lifecycle over the ledger store and the two
/// external collaborators
pub struct BillingOrchestrator {
    store: Arc<dyn LedgerStore>,
    jobs: Arc<dyn JobPort>,
    suggestions: Arc<dyn SuggestionPort>,
    config: LifecycleConfig,
}

impl BillingOrchestrator {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        jobs: Arc<dyn JobPort>,
        suggestions: Arc<dyn SuggestionPort>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            jobs,
            suggestions,
            config,
        }
    }

    /// Invoices a completed job
    ///
    /// Idempotent: a job that already has an invoice returns the existing
    /// invoice id with `created = false` and writes no new audit entry.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the job does not belong to the account
    /// - `InvalidState` if the job is not completed
    pub async fn handle_job_completed(
        &self,
        account_id: AccountId,
        job_id: JobId,
    ) -> Result<JobBillingOutcome, LifecycleError> {
        let job = self
            .jobs
            .find_job(account_id, job_id)
            .await?
            .filter(|j| j.account_id == account_id)
            .ok_or_else(|| LifecycleError::not_found("job", job_id))?;
        if !job.is_completed() {
            return Err(LifecycleError::invalid_state(format!(
                "job {} is {}, not completed",
                job.id,
                job.status.as_str()
            )));
        }

        if let Some(existing) = self.store.find_invoice_by_job(account_id, job_id).await? {
            return self.existing_outcome(account_id, existing).await;
        }

        let rules = self.jobs.pricing_rules(account_id).await?;
        let request = SuggestionRequest {
            account_id,
            job_id,
            description: job.description.clone(),
            area: job.area,
            hours_worked: job.hours_worked,
            pricing_rules: rules.clone(),
        };
        let suggestion = match self.suggestions.suggest(&request).await {
            Ok(response) if !response.line_items.is_empty() => Some(response),
            Ok(_) => {
                info!(job_id = %job_id, "suggestion returned no line items, using fallback");
                None
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "suggestion failed, using fallback");
                None
            }
        };

        let lines: Vec<SuggestedLine> = match &suggestion {
            Some(response) => response.line_items.clone(),
            None => vec![SuggestedLine {
                description: job.description.clone(),
                quantity: rust_decimal::Decimal::ONE,
                unit_price: rules.fallback_charge(&job)?,
            }],
        };

        let currency = rules.base_rate.currency();
        let mut subtotal = Money::zero(currency);
        for line in &lines {
            let amount = line.unit_price.mul_decimal(line.quantity)?;
            subtotal = subtotal.checked_add(&amount)?;
        }
        let tax = subtotal.mul_decimal(rules.tax_rate)?;

        let mut invoice = Invoice::new(account_id, subtotal, tax, self.due_date())?.with_job(job_id);
        if let Some(customer_id) = job.customer_id {
            invoice = invoice.with_customer(customer_id);
        }
        // The fallback path carries full confidence; only the value threshold
        // can route it to approval.
        let confidence = suggestion.as_ref().map(|s| s.confidence).unwrap_or(1.0);
        if confidence < self.config.confidence_threshold
            || invoice.total.minor() > self.config.high_value_minor
        {
            invoice = invoice.with_status(InvoiceStatus::PendingApproval);
        }

        let items = lines
            .iter()
            .map(|line| {
                LineItem::new(invoice.id, line.description.clone(), line.quantity, line.unit_price)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let invoice_id = match self.store.create_invoice(invoice.clone(), items).await {
            Ok(id) => id,
            // Lost a race with a concurrent run; fall back to the winner
            Err(LedgerError::DuplicateJobInvoice(_)) => {
                let existing = self
                    .store
                    .find_invoice_by_job(account_id, job_id)
                    .await?
                    .ok_or_else(|| LifecycleError::not_found("invoice for job", job_id))?;
                return self.existing_outcome(account_id, existing).await;
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            invoice_id = %invoice_id,
            job_id = %job_id,
            total_minor = invoice.total.minor(),
            status = invoice.status.as_str(),
            "invoice created for completed job"
        );
        self.append_audit(AuditEvent::new(
            account_id,
            AuditAction::InvoiceCreated,
            "invoice",
            invoice_id.to_string(),
            json!({
                "job_id": job_id.to_string(),
                "total_minor": invoice.total.minor(),
                "status": invoice.status.as_str(),
                "confidence": confidence,
            }),
        ))
        .await;

        let stage = LifecycleStage::infer(&invoice, Money::zero(currency));
        Ok(JobBillingOutcome {
            invoice_id,
            stage,
            created: true,
        })
    }

    /// Applies a captured payment to an invoice
    ///
    /// The paid total is recomputed from all completed payments for the
    /// invoice, never from a running sum. Overpayment opens an issue carrying
    /// the excess but the operation still succeeds.
    pub async fn handle_payment_received(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<PaymentOutcome, LifecycleError> {
        if !amount.is_positive() {
            return Err(LifecycleError::invalid_state(format!(
                "payment amount must be positive, got {}",
                amount
            )));
        }
        let mut invoice = self
            .store
            .find_invoice(account_id, invoice_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("invoice", invoice_id))?;

        let payment = Payment::new(account_id, amount, method).for_invoice(invoice_id);
        let payment_id = self.store.create_payment(payment).await?;

        let paid = self.paid_total(account_id, invoice_id, invoice.total.currency()).await?;
        let now = Utc::now();
        invoice.apply_paid_total(paid, now);
        self.store.update_invoice(&invoice).await?;

        let mut overpayment_issue = None;
        if paid > invoice.total {
            let excess = paid.checked_sub(&invoice.total)?;
            let outcome = self
                .store
                .open_issue(
                    BillingIssue::new(
                        account_id,
                        IssueType::Overpayment,
                        IssueSeverity::Medium,
                        format!("Overpayment of {} on invoice {}", excess, invoice_id),
                    )
                    .with_invoice(invoice_id)
                    .with_detail(json!({
                        "excess_minor": excess.minor(),
                        "paid_minor": paid.minor(),
                        "total_minor": invoice.total.minor(),
                    })),
                )
                .await?;
            overpayment_issue = Some(outcome.id());
        }

        info!(
            invoice_id = %invoice_id,
            payment_id = %payment_id,
            paid_minor = paid.minor(),
            status = invoice.status.as_str(),
            "payment applied"
        );
        self.append_audit(AuditEvent::new(
            account_id,
            AuditAction::PaymentRecorded,
            "payment",
            payment_id.to_string(),
            json!({
                "invoice_id": invoice_id.to_string(),
                "amount_minor": amount.minor(),
                "invoice_status": invoice.status.as_str(),
            }),
        ))
        .await;

        Ok(PaymentOutcome {
            payment_id,
            invoice_status: invoice.status,
            paid_total: paid,
            overpayment_issue,
        })
    }

    /// Opens a dispute on an invoice
    ///
    /// Flips the invoice to `DISPUTED` and returns the issue id as the
    /// hand-off point to remediation.
    pub async fn handle_dispute_detected(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
        reason: &str,
    ) -> Result<IssueId, LifecycleError> {
        let mut invoice = self
            .store
            .find_invoice(account_id, invoice_id)
            .await?
            .ok_or_else(|| LifecycleError::not_found("invoice", invoice_id))?;

        let outcome = self
            .store
            .open_issue(
                BillingIssue::new(
                    account_id,
                    IssueType::Dispute,
                    IssueSeverity::High,
                    format!("Dispute on invoice {}", invoice_id),
                )
                .with_invoice(invoice_id)
                .with_detail(json!({ "reason": reason })),
            )
            .await?;

        if invoice.status != InvoiceStatus::Disputed {
            invoice.status = InvoiceStatus::Disputed;
            invoice.updated_at = Utc::now();
            self.store.update_invoice(&invoice).await?;
        }

        info!(invoice_id = %invoice_id, issue_id = %outcome.id(), "dispute opened");
        self.append_audit(AuditEvent::new(
            account_id,
            AuditAction::DisputeOpened,
            "invoice",
            invoice_id.to_string(),
            json!({ "issue_id": outcome.id().to_string(), "reason": reason }),
        ))
        .await;

        Ok(outcome.id())
    }

    /// Sweeps sent invoices past their due date
    ///
    /// At most one open `OVERDUE` issue per invoice; severity scales with
    /// days overdue. Pure function of `today` and stored data, safe to run on
    /// any schedule.
    pub async fn check_overdue_invoices(
        &self,
        account_id: AccountId,
        today: NaiveDate,
    ) -> Result<OverdueSweep, LifecycleError> {
        let sent = self
            .store
            .invoices_in_status(account_id, &[InvoiceStatus::Sent])
            .await?;
        let already_flagged: HashSet<InvoiceId> = self
            .store
            .open_issues(account_id)
            .await?
            .into_iter()
            .filter(|issue| issue.issue_type == IssueType::Overdue)
            .filter_map(|issue| issue.invoice_id)
            .collect();

        let mut flagged = Vec::new();
        for invoice in sent.iter().filter(|i| i.is_past_due(today)) {
            if already_flagged.contains(&invoice.id) {
                continue;
            }
            let days = (today - invoice.due_date).num_days();
            let severity = if days > self.config.overdue_high_days {
                IssueSeverity::High
            } else if days > self.config.overdue_medium_days {
                IssueSeverity::Medium
            } else {
                IssueSeverity::Low
            };
            let outcome = self
                .store
                .open_issue(
                    BillingIssue::new(
                        account_id,
                        IssueType::Overdue,
                        severity,
                        format!("Invoice {} overdue by {} days", invoice.id, days),
                    )
                    .with_invoice(invoice.id)
                    .with_detail(json!({
                        "days_overdue": days,
                        "due_date": invoice.due_date.to_string(),
                        "total_minor": invoice.total.minor(),
                    })),
                )
                .await?;
            if outcome.created() {
                flagged.push(invoice.id);
            }
        }

        if !flagged.is_empty() {
            info!(account_id = %account_id, count = flagged.len(), "overdue invoices flagged");
        }
        Ok(OverdueSweep {
            examined: sent.len(),
            flagged,
        })
    }

    async fn existing_outcome(
        &self,
        account_id: AccountId,
        invoice: Invoice,
    ) -> Result<JobBillingOutcome, LifecycleError> {
        let paid = self.paid_total(account_id, invoice.id, invoice.total.currency()).await?;
        Ok(JobBillingOutcome {
            invoice_id: invoice.id,
            stage: LifecycleStage::infer(&invoice, paid),
            created: false,
        })
    }

    async fn paid_total(
        &self,
        account_id: AccountId,
        invoice_id: InvoiceId,
        currency: core_kernel::Currency,
    ) -> Result<Money, LifecycleError> {
        let payments = self.store.payments_for_invoice(account_id, invoice_id).await?;
        let mut total = Money::zero(currency);
        for payment in payments.iter().filter(|p| p.is_completed()) {
            total = total.checked_add(&payment.amount)?;
        }
        Ok(total)
    }

    fn due_date(&self) -> NaiveDate {
        (Utc::now() + Duration::days(self.config.due_days)).date_naive()
    }

    async fn append_audit(&self, event: AuditEvent) {
        if let Err(e) = self.store.append_audit(event).await {
            warn!(error = %e, "audit write failed, mutation stands");
        }
    }
}
