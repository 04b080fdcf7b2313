//! The reconciliation engine
//!
//! Holds the ledger store and the accounting port; the operations live in
//! [`crate::internal`], [`crate::outbound`], and [`crate::inbound`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::warn;

use core_kernel::AccountId;
use domain_ledger::{AccountIntegration, IntegrationStatus, LedgerStore};

use crate::accounting::AccountingPort;
use crate::config::ReconciliationConfig;
use crate::error::ReconciliationError;

/// Reconciles ledger state internally and against the accounting system
pub struct ReconciliationEngine {
    pub(crate) store: Arc<dyn LedgerStore>,
    pub(crate) accounting: Arc<dyn AccountingPort>,
    pub(crate) config: ReconciliationConfig,
}

impl ReconciliationEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        accounting: Arc<dyn AccountingPort>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            store,
            accounting,
            config,
        }
    }

    /// Loads the account's integration row for the configured system
    pub(crate) async fn require_integration(
        &self,
        account_id: AccountId,
    ) -> Result<AccountIntegration, ReconciliationError> {
        self.store
            .integration(account_id, &self.config.system)
            .await?
            .ok_or_else(|| {
                ReconciliationError::integration_missing(account_id, self.config.system.clone())
            })
    }

    /// Refreshes the access token when it is about to expire
    ///
    /// Refresh failure is tolerated while the current token is still valid;
    /// once the token has expired a failed refresh is fatal and the
    /// integration is marked degraded.
    pub(crate) async fn ensure_fresh_token(
        &self,
        integration: &mut AccountIntegration,
    ) -> Result<(), ReconciliationError> {
        let now = Utc::now();
        let window = Duration::seconds(self.config.token_refresh_window_secs);
        if !integration.token_expires_within(window, now) {
            return Ok(());
        }

        match self.accounting.refresh_token(integration).await {
            Ok(refresh) => {
                integration.update_tokens(
                    refresh.access_token,
                    refresh.refresh_token,
                    refresh.expires_at,
                );
                self.store.upsert_integration(integration).await?;
                Ok(())
            }
            Err(e) if integration.token_valid(now) => {
                warn!(
                    account_id = %integration.account_id,
                    error = %e,
                    "token refresh failed, continuing on current token"
                );
                Ok(())
            }
            Err(e) => {
                integration.status = IntegrationStatus::Degraded;
                self.store.upsert_integration(integration).await?;
                Err(ReconciliationError::Port(e))
            }
        }
    }
}
