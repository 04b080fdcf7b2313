//! Lifecycle configuration

use serde::Deserialize;

/// Thresholds governing the billing lifecycle
///
/// Loaded from environment variables prefixed with `BILLING` (for example
/// `BILLING_CONFIDENCE_THRESHOLD`); unset fields fall back to the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Suggestions below this confidence route the invoice to approval
    pub confidence_threshold: f64,
    /// Invoice totals above this amount (minor units) route to approval
    pub high_value_minor: i64,
    /// Days overdue before an overdue issue is raised HIGH
    pub overdue_high_days: i64,
    /// Days overdue before an overdue issue is raised MEDIUM
    pub overdue_medium_days: i64,
    /// Days from invoice creation to the due date
    pub due_days: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            high_value_minor: 100_000,
            overdue_high_days: 30,
            overdue_medium_days: 14,
            due_days: 14,
        }
    }
}

impl LifecycleConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        config::Config::builder()
            .add_source(config::Environment::with_prefix("BILLING"))
            .build()?
            .try_deserialize()
    }
}
