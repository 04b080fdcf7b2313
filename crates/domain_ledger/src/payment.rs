//! Payment records
//!
//! A payment is created once per captured transaction and is immutable
//! except for status corrections. The optional external identifier is unique
//! per account and is the primary de-duplication key for inbound sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{AccountId, InvoiceId, Money, PaymentId};

use crate::error::LedgerError;

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    Cash,
    Check,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Check => "CHECK",
            PaymentMethod::Online => "ONLINE",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CARD" | "CREDIT_CARD" | "DEBIT_CARD" => Ok(PaymentMethod::Card),
            "BANK_TRANSFER" | "ACH" => Ok(PaymentMethod::BankTransfer),
            "CASH" => Ok(PaymentMethod::Cash),
            "CHECK" | "CHEQUE" => Ok(PaymentMethod::Check),
            "ONLINE" => Ok(PaymentMethod::Online),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Being processed
    Pending,
    /// Captured successfully; the only status counted toward paid totals
    Completed,
    /// Capture failed
    Failed,
    /// Returned to the payer
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = LedgerError;

    /// `SUCCEEDED` is accepted as an alias for `COMPLETED`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "COMPLETED" | "SUCCEEDED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// A payment record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Owning account
    pub account_id: AccountId,
    /// Invoice being paid, when the payment could be matched
    pub invoice_id: Option<InvoiceId>,
    /// Payment amount
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// Status
    pub status: PaymentStatus,
    /// When the payment occurred
    pub occurred_at: DateTime<Utc>,
    /// Identifier in the external accounting system; unique per account
    pub external_id: Option<String>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new completed payment
    pub fn new(account_id: AccountId, amount: Money, method: PaymentMethod) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new_v7(),
            account_id,
            invoice_id: None,
            amount,
            method,
            status: PaymentStatus::Completed,
            occurred_at: now,
            external_id: None,
            created_at: now,
        }
    }

    /// Links the paid invoice
    pub fn for_invoice(mut self, invoice_id: InvoiceId) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    /// Sets the external-system identifier
    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    /// Sets when the payment occurred
    pub fn occurred(mut self, at: DateTime<Utc>) -> Self {
        self.occurred_at = at;
        self
    }

    /// Sets the status
    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns true if the payment counts toward an invoice's paid total
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::Currency;

    #[test]
    fn test_payment_defaults_to_completed() {
        let payment = Payment::new(
            AccountId::new(),
            Money::from_minor(5_000, Currency::USD),
            PaymentMethod::Card,
        );
        assert!(payment.is_completed());
        assert!(payment.invoice_id.is_none());
        assert!(payment.external_id.is_none());
    }

    #[test]
    fn test_succeeded_alias_normalizes_to_completed() {
        assert_eq!(
            "succeeded".parse::<PaymentStatus>().unwrap(),
            PaymentStatus::Completed
        );
        assert_eq!("COMPLETED".parse::<PaymentStatus>().unwrap(), PaymentStatus::Completed);
    }

    #[test]
    fn test_method_aliases() {
        assert_eq!("credit_card".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert_eq!("cheque".parse::<PaymentMethod>().unwrap(), PaymentMethod::Check);
        assert!("barter".parse::<PaymentMethod>().is_err());
    }
}
