//! Account pricing rules and the deterministic fallback charge

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, MoneyError};

use crate::job::Job;

/// Pricing rules configured for an account
///
/// All rates share one currency; the tax rate is a fraction (0.08 for 8%).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRules {
    /// Flat charge for any completed job
    pub base_rate: Money,
    /// Rate per serviced area unit
    pub per_area_rate: Option<Money>,
    /// Rate per labor hour
    pub per_hour_rate: Option<Money>,
    /// Floor below which no job is billed
    pub minimum_charge: Money,
    /// Tax rate applied to the subtotal
    pub tax_rate: Decimal,
}

impl PricingRules {
    /// Computes the deterministic fallback charge for a job
    ///
    /// Used when the content-suggestion collaborator fails or returns no
    /// line items: the greatest of the base rate, the per-area charge, the
    /// per-hour charge, and the minimum charge.
    pub fn fallback_charge(&self, job: &Job) -> Result<Money, MoneyError> {
        let mut best = self.base_rate;

        if let (Some(rate), Some(area)) = (self.per_area_rate, job.area) {
            let charge = rate.mul_decimal(area)?;
            if charge > best {
                best = charge;
            }
        }
        if let (Some(rate), Some(hours)) = (self.per_hour_rate, job.hours_worked) {
            let charge = rate.mul_decimal(hours)?;
            if charge > best {
                best = charge;
            }
        }
        if self.minimum_charge > best {
            best = self.minimum_charge;
        }
        Ok(best)
    }
}
