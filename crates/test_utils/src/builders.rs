//! Test Data Builders
//!
//! Builder patterns for constructing test entities with sensible defaults;
//! tests set only the fields they care about.

use chrono::{DateTime, NaiveDate, Utc};
use fake::faker::company::en::CatchPhrase;
use fake::Fake;
use rust_decimal::Decimal;

use core_kernel::{AccountId, CustomerId, InvoiceId, JobId, Money};
use domain_ledger::{Invoice, InvoiceStatus, Payment, PaymentMethod, PaymentStatus};
use domain_lifecycle::{Job, JobStatus};

use crate::fixtures::{MoneyFixtures, TemporalFixtures};

/// Builder for test invoices
pub struct InvoiceBuilder {
    account_id: AccountId,
    job_id: Option<JobId>,
    customer_id: Option<CustomerId>,
    subtotal: Money,
    tax: Money,
    status: InvoiceStatus,
    due_date: NaiveDate,
    external_id: Option<String>,
}

impl InvoiceBuilder {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            job_id: None,
            customer_id: None,
            subtotal: MoneyFixtures::example_subtotal(),
            tax: MoneyFixtures::example_tax(),
            status: InvoiceStatus::Sent,
            due_date: TemporalFixtures::due_date(),
            external_id: None,
        }
    }

    pub fn with_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn with_amounts(mut self, subtotal: Money, tax: Money) -> Self {
        self.subtotal = subtotal;
        self.tax = tax;
        self
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Builds the invoice; panics on invalid amounts, which is fine in tests
    pub fn build(self) -> Invoice {
        let mut invoice = Invoice::new(self.account_id, self.subtotal, self.tax, self.due_date)
            .expect("builder amounts must be valid")
            .with_status(self.status);
        if let Some(job_id) = self.job_id {
            invoice = invoice.with_job(job_id);
        }
        if let Some(customer_id) = self.customer_id {
            invoice = invoice.with_customer(customer_id);
        }
        invoice.external_id = self.external_id;
        invoice
    }
}

/// Builder for test payments
pub struct PaymentBuilder {
    account_id: AccountId,
    invoice_id: Option<InvoiceId>,
    amount: Money,
    method: PaymentMethod,
    status: PaymentStatus,
    external_id: Option<String>,
    occurred_at: DateTime<Utc>,
}

impl PaymentBuilder {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            invoice_id: None,
            amount: MoneyFixtures::usd(5_000),
            method: PaymentMethod::Card,
            status: PaymentStatus::Completed,
            external_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn for_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    pub fn with_amount(mut self, amount: Money) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn occurred(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = at;
        self
    }

    pub fn build(self) -> Payment {
        let mut payment = Payment::new(self.account_id, self.amount, self.method)
            .with_status(self.status)
            .occurred(self.occurred_at);
        if let Some(invoice_id) = self.invoice_id {
            payment = payment.for_invoice(invoice_id);
        }
        if let Some(external_id) = self.external_id {
            payment = payment.with_external_id(external_id);
        }
        payment
    }
}

/// Builder for test jobs
pub struct JobBuilder {
    account_id: AccountId,
    status: JobStatus,
    description: String,
    area: Option<Decimal>,
    hours_worked: Option<Decimal>,
    customer_id: Option<CustomerId>,
}

impl JobBuilder {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            status: JobStatus::Completed,
            description: CatchPhrase().fake(),
            area: None,
            hours_worked: None,
            customer_id: None,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_area(mut self, area: Decimal) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_hours(mut self, hours: Decimal) -> Self {
        self.hours_worked = Some(hours);
        self
    }

    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn build(self) -> Job {
        let completed = self.status == JobStatus::Completed;
        Job {
            id: JobId::new(),
            account_id: self.account_id,
            customer_id: self.customer_id,
            status: self.status,
            description: self.description,
            area: self.area,
            hours_worked: self.hours_worked,
            completed_at: completed.then(Utc::now),
        }
    }
}
