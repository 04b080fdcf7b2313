//! Reconciliation configuration

use serde::Deserialize;

/// Settings for the reconciliation and sync engine
///
/// Loaded from environment variables prefixed with `BILLING` (for example
/// `BILLING_TOKEN_REFRESH_WINDOW_SECS`); unset fields fall back to defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// External accounting system name, keys the account integration row
    pub system: String,
    /// Refresh the access token when it expires within this many seconds
    pub token_refresh_window_secs: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            system: "books".to_string(),
            token_refresh_window_secs: 300,
        }
    }
}

impl ReconciliationConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        config::Config::builder()
            .add_source(config::Environment::with_prefix("BILLING"))
            .build()?
            .try_deserialize()
    }
}
