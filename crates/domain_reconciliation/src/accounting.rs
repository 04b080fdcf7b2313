//! Accounting-system port and its wire representations
//!
//! The external system speaks decimal major units; minor-unit `Money` is
//! converted at this boundary and nowhere else.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::PortError;
use domain_ledger::AccountIntegration;

/// One line on an invoice as pushed to the accounting system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

/// An invoice as pushed to the accounting system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalInvoice {
    /// Local invoice id, echoed back for traceability
    pub invoice_ref: String,
    pub customer_ref: Option<String>,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub currency: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub lines: Vec<ExternalLine>,
}

/// A payment as pulled from the accounting system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalPayment {
    /// Identifier in the accounting system; the inbound dedup key
    pub external_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
    pub method: Option<String>,
    /// External ids of invoices this payment applies to; the first resolvable
    /// reference wins
    pub invoice_refs: Vec<String>,
}

/// Refreshed credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRefresh {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Port to the external accounting system
#[async_trait]
pub trait AccountingPort: Send + Sync {
    /// Pushes an invoice, returning its identifier in the external system
    async fn push_invoice(
        &self,
        integration: &AccountIntegration,
        invoice: &ExternalInvoice,
    ) -> Result<String, PortError>;

    /// Pulls payments recorded since the given instant
    async fn pull_payments(
        &self,
        integration: &AccountIntegration,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ExternalPayment>, PortError>;

    /// Exchanges the refresh token for fresh credentials
    async fn refresh_token(
        &self,
        integration: &AccountIntegration,
    ) -> Result<TokenRefresh, PortError>;
}
