//! Account integrations with external accounting systems

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{AccountId, IntegrationId};

use crate::error::LedgerError;

/// Connection status of an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrationStatus {
    Connected,
    Degraded,
    Disconnected,
}

impl IntegrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationStatus::Connected => "CONNECTED",
            IntegrationStatus::Degraded => "DEGRADED",
            IntegrationStatus::Disconnected => "DISCONNECTED",
        }
    }
}

impl FromStr for IntegrationStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONNECTED" => Ok(IntegrationStatus::Connected),
            "DEGRADED" => Ok(IntegrationStatus::Degraded),
            "DISCONNECTED" => Ok(IntegrationStatus::Disconnected),
            other => Err(LedgerError::UnknownStatus(other.to_string())),
        }
    }
}

/// Credentials and sync state for one (account, external system) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountIntegration {
    /// Unique identifier
    pub id: IntegrationId,
    /// Owning account
    pub account_id: AccountId,
    /// External system name (e.g., "books")
    pub system: String,
    /// Current access token
    pub access_token: String,
    /// Refresh token
    pub refresh_token: String,
    /// Access token expiry
    pub token_expires_at: DateTime<Utc>,
    /// Last fully successful sync
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Connection status
    pub status: IntegrationStatus,
}

impl AccountIntegration {
    /// Creates a connected integration
    pub fn new(
        account_id: AccountId,
        system: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: IntegrationId::new_v7(),
            account_id,
            system: system.into(),
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_expires_at,
            last_synced_at: None,
            status: IntegrationStatus::Connected,
        }
    }

    /// Returns true if the access token is still valid at `now`
    pub fn token_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.token_expires_at
    }

    /// Returns true if the token expires within `window` of `now`
    ///
    /// Used to refresh proactively rather than on failure.
    pub fn token_expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.token_expires_at <= now + window
    }

    /// Applies refreshed credentials
    pub fn update_tokens(
        &mut self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) {
        self.access_token = access_token.into();
        self.refresh_token = refresh_token.into();
        self.token_expires_at = expires_at;
        self.status = IntegrationStatus::Connected;
    }

    /// Advances the last-successful-sync marker
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_synced_at = Some(at);
        self.status = IntegrationStatus::Connected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_integration(expires_in_secs: i64) -> AccountIntegration {
        AccountIntegration::new(
            AccountId::new(),
            "books",
            "access",
            "refresh",
            Utc::now() + Duration::seconds(expires_in_secs),
        )
    }

    #[test]
    fn test_token_expiry_window() {
        let now = Utc::now();
        let soon = test_integration(120);
        let later = test_integration(3_600);

        assert!(soon.token_expires_within(Duration::seconds(300), now));
        assert!(!later.token_expires_within(Duration::seconds(300), now));
        assert!(soon.token_valid(now));
    }

    #[test]
    fn test_update_tokens_reconnects() {
        let mut integration = test_integration(10);
        integration.status = IntegrationStatus::Degraded;

        let new_expiry = Utc::now() + Duration::hours(1);
        integration.update_tokens("new-access", "new-refresh", new_expiry);

        assert_eq!(integration.status, IntegrationStatus::Connected);
        assert_eq!(integration.access_token, "new-access");
        assert_eq!(integration.token_expires_at, new_expiry);
    }
}
