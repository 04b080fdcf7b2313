//! Invoices and their line items

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{AccountId, CustomerId, InvoiceId, JobId, Money};

use crate::error::LedgerError;

/// Invoice status
///
/// The closed set of statuses an invoice can hold. String forms exist only
/// at the storage boundary, through [`InvoiceStatus::as_str`] and `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    /// Generated, not yet released
    Draft,
    /// Held for human approval (low suggestion confidence or high value)
    PendingApproval,
    /// Released to the customer / external system
    Sent,
    /// Partially paid
    Partial,
    /// Fully paid
    Paid,
    /// Past due date
    Overdue,
    /// Under dispute, awaiting remediation
    Disputed,
}

impl InvoiceStatus {
    /// Canonical storage form
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::PendingApproval => "PENDING_APPROVAL",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Partial => "PARTIAL",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Disputed => "DISPUTED",
        }
    }

    /// Returns true for statuses the reconciliation pass examines
    pub fn is_reconcilable(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Sent | InvoiceStatus::Partial | InvoiceStatus::Overdue | InvoiceStatus::Paid
        )
    }
}

impl FromStr for InvoiceStatus {
    type Err = LedgerError;

    /// Case-insensitive normalization. `PARTIALLY_PAID` is accepted as a
    /// legacy alias for `PARTIAL`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "PENDING_APPROVAL" => Ok(InvoiceStatus::PendingApproval),
            "SENT" => Ok(InvoiceStatus::Sent),
            "PARTIAL" | "PARTIALLY_PAID" => Ok(InvoiceStatus::Partial),
            "PAID" => Ok(InvoiceStatus::Paid),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            "DISPUTED" => Ok(InvoiceStatus::Disputed),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// An invoice raised for a completed job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Owning account
    pub account_id: AccountId,
    /// Originating job, when the invoice came out of the lifecycle
    pub job_id: Option<JobId>,
    /// Customer being billed
    pub customer_id: Option<CustomerId>,
    /// Sum of line item amounts
    pub subtotal: Money,
    /// Tax amount
    pub tax: Money,
    /// Subtotal plus tax
    pub total: Money,
    /// Status
    pub status: InvoiceStatus,
    /// Payment due date
    pub due_date: NaiveDate,
    /// Set only when fully paid, cleared otherwise
    pub paid_at: Option<DateTime<Utc>>,
    /// Identifier in the external accounting system, once synced
    pub external_id: Option<String>,
    /// Last successful outbound sync
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates a new draft invoice
    ///
    /// # Errors
    ///
    /// Returns error if any amount is negative or the totals disagree.
    pub fn new(
        account_id: AccountId,
        subtotal: Money,
        tax: Money,
        due_date: NaiveDate,
    ) -> Result<Self, LedgerError> {
        let total = subtotal.checked_add(&tax)?;
        let now = Utc::now();
        let invoice = Self {
            id: InvoiceId::new_v7(),
            account_id,
            job_id: None,
            customer_id: None,
            subtotal,
            tax,
            total,
            status: InvoiceStatus::Draft,
            due_date,
            paid_at: None,
            external_id: None,
            last_synced_at: None,
            created_at: now,
            updated_at: now,
        };
        invoice.validate()?;
        Ok(invoice)
    }

    /// Links the originating job
    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Links the billed customer
    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    /// Sets the initial status
    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    /// Checks the monetary invariants: `total = subtotal + tax`, all
    /// amounts non-negative
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.subtotal.is_negative() || self.tax.is_negative() || self.total.is_negative() {
            return Err(LedgerError::InvariantViolation(format!(
                "negative amount on invoice {}",
                self.id
            )));
        }
        let expected = self.subtotal.checked_add(&self.tax)?;
        if expected != self.total {
            return Err(LedgerError::InvariantViolation(format!(
                "invoice {} total {} != subtotal {} + tax {}",
                self.id, self.total, self.subtotal, self.tax
            )));
        }
        Ok(())
    }

    /// Applies a freshly recomputed paid total
    ///
    /// Remainder at or below zero marks the invoice `PAID` and stamps
    /// `paid_at`; any smaller positive total marks it `PARTIAL` and
    /// explicitly clears `paid_at`. A zero total leaves the status alone.
    pub fn apply_paid_total(&mut self, paid: Money, now: DateTime<Utc>) {
        if paid >= self.total && paid.is_positive() {
            self.status = InvoiceStatus::Paid;
            self.paid_at = Some(now);
        } else if paid.is_positive() {
            self.status = InvoiceStatus::Partial;
            self.paid_at = None;
        } else {
            self.paid_at = None;
        }
        self.updated_at = now;
    }

    /// Records a successful outbound sync
    ///
    /// Pre-payment statuses flip to `SENT`; payment and exception statuses
    /// are kept, syncing must not roll an invoice's lifecycle back.
    pub fn mark_synced(&mut self, external_id: impl Into<String>, now: DateTime<Utc>) {
        self.external_id = Some(external_id.into());
        self.last_synced_at = Some(now);
        if matches!(
            self.status,
            InvoiceStatus::Draft | InvoiceStatus::PendingApproval | InvoiceStatus::Sent
        ) {
            self.status = InvoiceStatus::Sent;
        }
        self.updated_at = now;
    }

    /// Returns true when the due date has passed
    pub fn is_past_due(&self, today: NaiveDate) -> bool {
        today > self.due_date
    }
}

/// Service classification for a line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceClass {
    Labor,
    Materials,
    TravelFee,
    Other,
}

impl ServiceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceClass::Labor => "LABOR",
            ServiceClass::Materials => "MATERIALS",
            ServiceClass::TravelFee => "TRAVEL_FEE",
            ServiceClass::Other => "OTHER",
        }
    }
}

impl FromStr for ServiceClass {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LABOR" => Ok(ServiceClass::Labor),
            "MATERIALS" => Ok(ServiceClass::Materials),
            "TRAVEL_FEE" => Ok(ServiceClass::TravelFee),
            "OTHER" => Ok(ServiceClass::Other),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// A line item on an invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Item ID
    pub id: Uuid,
    /// Owning invoice
    pub invoice_id: InvoiceId,
    /// Description
    pub description: String,
    /// Quantity
    pub quantity: Decimal,
    /// Unit price in minor units
    pub unit_price: Money,
    /// `quantity x unit_price`, rounded to minor units
    pub amount: Money,
    /// Optional service classification
    pub classification: Option<ServiceClass>,
}

impl LineItem {
    /// Creates a new line item, computing the amount
    pub fn new(
        invoice_id: InvoiceId,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Money,
    ) -> Result<Self, LedgerError> {
        let amount = unit_price.mul_decimal(quantity)?;
        Ok(Self {
            id: Uuid::new_v4(),
            invoice_id,
            description: description.into(),
            quantity,
            unit_price,
            amount,
            classification: None,
        })
    }

    /// Sets the service classification
    pub fn with_classification(mut self, classification: ServiceClass) -> Self {
        self.classification = Some(classification);
        self
    }
}
