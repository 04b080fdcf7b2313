//! Money held as integer minor currency units
//!
//! Monetary amounts are stored as `i64` minor units (cents for USD) so that
//! arithmetic is exact and free of floating-point rounding error. Decimal
//! values appear only at the edges: rate multiplication (tax, quantity) and
//! the representation exchanged with the external accounting system.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Neg, Sub};
use thiserror::Error;

/// Currency codes following ISO 4217
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl Currency {
    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u32 {
        2
    }

    /// Returns the ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "CAD" => Ok(Currency::CAD),
            "AUD" => Ok(Currency::AUD),
            other => Err(MoneyError::UnknownCurrency(other.to_string())),
        }
    }
}

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Currency mismatch: cannot operate on {0} and {1}")]
    CurrencyMismatch(String, String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Amount out of range: {0}")]
    OutOfRange(String),

    #[error("Overflow during calculation")]
    Overflow,
}

/// A monetary amount in integer minor units with an associated currency
///
/// # Invariants
///
/// - Arithmetic between amounts of different currencies is rejected
/// - Conversions from decimal round half away from zero to minor units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates a Money value from minor units (e.g., cents)
    pub fn from_minor(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    /// Creates a zero amount in the specified currency
    pub fn zero(currency: Currency) -> Self {
        Self { minor: 0, currency }
    }

    /// Returns the amount in minor units
    pub fn minor(&self) -> i64 {
        self.minor
    }

    /// Returns the currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Converts to a decimal in major units (e.g., 1500 cents -> 15.00)
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.minor, self.currency.decimal_places())
    }

    /// Creates a Money value from a decimal amount in major units
    ///
    /// Fractional minor units are rounded half away from zero, matching how
    /// tax amounts are rounded on invoices.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::OutOfRange` if the amount does not fit in an i64
    /// of minor units.
    pub fn from_decimal(amount: Decimal, currency: Currency) -> Result<Self, MoneyError> {
        let scale = Decimal::from(10_i64.pow(currency.decimal_places()));
        let minor = (amount * scale)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| MoneyError::OutOfRange(amount.to_string()))?;
        Ok(Self { minor, currency })
    }

    /// Multiplies by a decimal factor, rounding half away from zero
    ///
    /// Used for `quantity x unit_price` and `subtotal x tax_rate`.
    pub fn mul_decimal(&self, factor: Decimal) -> Result<Self, MoneyError> {
        Self::from_decimal(self.to_decimal() * factor, self.currency)
    }

    /// Checked addition, rejecting currency mismatch and overflow
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let minor = self.minor.checked_add(other.minor).ok_or(MoneyError::Overflow)?;
        Ok(Self { minor, currency: self.currency })
    }

    /// Checked subtraction, rejecting currency mismatch and overflow
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        self.ensure_same_currency(other)?;
        let minor = self.minor.checked_sub(other.minor).ok_or(MoneyError::Overflow)?;
        Ok(Self { minor, currency: self.currency })
    }

    /// Returns true if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.minor == 0
    }

    /// Returns true if the amount is negative
    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    /// Returns true if the amount is greater than zero
    pub fn is_positive(&self) -> bool {
        self.minor > 0
    }

    /// Returns the absolute value
    pub fn abs(&self) -> Self {
        Self { minor: self.minor.abs(), currency: self.currency }
    }

    fn ensure_same_currency(&self, other: &Money) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch(
                self.currency.to_string(),
                other.currency.to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_decimal(), self.currency)
    }
}

impl Add for Money {
    type Output = Money;

    /// Panics on currency mismatch or overflow; use `checked_add` where the
    /// operands come from untrusted input.
    fn add(self, other: Money) -> Money {
        match self.checked_add(&other) {
            Ok(result) => result,
            Err(e) => panic!("money addition failed: {}", e),
        }
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, other: Money) -> Money {
        match self.checked_sub(&other) {
            Ok(result) => result,
            Err(e) => panic!("money subtraction failed: {}", e),
        }
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money { minor: -self.minor, currency: self.currency }
    }
}

impl PartialOrd for Money {
    /// Amounts of different currencies are unordered
    fn partial_cmp(&self, other: &Money) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        Some(self.minor.cmp(&other.minor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_minor_round_trip() {
        let money = Money::from_minor(15_000, Currency::USD);
        assert_eq!(money.to_decimal(), dec!(150.00));
        assert_eq!(money.minor(), 15_000);
    }

    #[test]
    fn test_from_decimal_rounds_half_away() {
        let up = Money::from_decimal(dec!(11.115), Currency::USD).unwrap();
        assert_eq!(up.minor(), 1112);

        let down = Money::from_decimal(dec!(11.114), Currency::USD).unwrap();
        assert_eq!(down.minor(), 1111);
    }

    #[test]
    fn test_tax_rounding_example() {
        // 13889 cents at 8% -> 1111.12 cents -> 1111
        let subtotal = Money::from_minor(13_889, Currency::USD);
        let tax = subtotal.mul_decimal(dec!(0.08)).unwrap();
        assert_eq!(tax.minor(), 1111);
    }

    #[test]
    fn test_currency_mismatch_rejected() {
        let usd = Money::from_minor(100, Currency::USD);
        let eur = Money::from_minor(100, Currency::EUR);
        assert!(matches!(
            usd.checked_add(&eur),
            Err(MoneyError::CurrencyMismatch(_, _))
        ));
        assert_eq!(usd.partial_cmp(&eur), None);
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert!("XYZ".parse::<Currency>().is_err());
    }

    proptest! {
        #[test]
        fn prop_add_sub_round_trip(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000) {
            let x = Money::from_minor(a, Currency::USD);
            let y = Money::from_minor(b, Currency::USD);
            let back = x.checked_add(&y).unwrap().checked_sub(&y).unwrap();
            prop_assert_eq!(back, x);
        }

        #[test]
        fn prop_decimal_round_trip(minor in -1_000_000_000i64..1_000_000_000) {
            let money = Money::from_minor(minor, Currency::USD);
            let back = Money::from_decimal(money.to_decimal(), Currency::USD).unwrap();
            prop_assert_eq!(back.minor(), minor);
        }
    }
}
