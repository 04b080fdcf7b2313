//! Pre-built test data
//!
//! Small, deterministic values for the common cases; anything scenario
//! specific goes through the builders instead.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use core_kernel::{AccountId, Currency, Money};
use domain_ledger::AccountIntegration;
use domain_lifecycle::PricingRules;
use domain_reconciliation::ExternalPayment;
use rust_decimal_macros::dec;

/// Money helpers
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::USD)
    }

    /// The worked billing example: subtotal 13889 + tax 1111 = 15000
    pub fn example_subtotal() -> Money {
        Self::usd(13_889)
    }

    pub fn example_tax() -> Money {
        Self::usd(1_111)
    }
}

/// Date helpers
pub struct TemporalFixtures;

impl TemporalFixtures {
    pub fn due_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 1).unwrap()
    }

    pub fn day_after_due() -> NaiveDate {
        Self::due_date() + Duration::days(1)
    }

    pub fn long_after_due() -> NaiveDate {
        Self::due_date() + Duration::days(45)
    }
}

/// Default pricing rules: base 50.00, 1.50/area, 40.00/hour, minimum 25.00,
/// 8% tax
pub fn pricing_rules() -> PricingRules {
    PricingRules {
        base_rate: MoneyFixtures::usd(5_000),
        per_area_rate: Some(MoneyFixtures::usd(150)),
        per_hour_rate: Some(MoneyFixtures::usd(4_000)),
        minimum_charge: MoneyFixtures::usd(2_500),
        tax_rate: dec!(0.08),
    }
}

/// A connected integration whose token is valid for an hour
pub fn connected_integration(account_id: AccountId) -> AccountIntegration {
    AccountIntegration::new(
        account_id,
        "books",
        "access-token",
        "refresh-token",
        Utc::now() + Duration::hours(1),
    )
}

/// A connected integration whose token expires within the refresh window
pub fn expiring_integration(account_id: AccountId) -> AccountIntegration {
    AccountIntegration::new(
        account_id,
        "books",
        "stale-access-token",
        "refresh-token",
        Utc::now() + Duration::seconds(60),
    )
}

/// An external payment referencing the given external invoice id
pub fn external_payment(
    external_id: &str,
    amount_major: rust_decimal::Decimal,
    invoice_ref: Option<&str>,
    occurred_at: DateTime<Utc>,
) -> ExternalPayment {
    ExternalPayment {
        external_id: external_id.to_string(),
        amount: amount_major,
        currency: "USD".to_string(),
        occurred_at,
        method: Some("CARD".to_string()),
        invoice_refs: invoice_ref.map(String::from).into_iter().collect(),
    }
}
