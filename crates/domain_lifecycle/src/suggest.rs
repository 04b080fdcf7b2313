//! Content-suggestion port
//!
//! A low-trust, fallible collaborator that proposes invoice line items for a
//! completed job. The orchestrator never fails because of it; any error or
//! empty response falls back to deterministic pricing.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{AccountId, JobId, Money, PortError};

use crate::pricing::PricingRules;

/// Request for line-item suggestions
///
/// Carries a snapshot of the account's pricing rules so the collaborator
/// prices against the same rules the fallback would use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub account_id: AccountId,
    pub job_id: JobId,
    pub description: String,
    pub area: Option<Decimal>,
    pub hours_worked: Option<Decimal>,
    pub pricing_rules: PricingRules,
}

/// One suggested line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedLine {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
}

/// Suggested line items with the collaborator's self-reported confidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub line_items: Vec<SuggestedLine>,
    /// In `[0.0, 1.0]`; below the configured threshold the invoice is held
    /// for approval
    pub confidence: f64,
}

/// Port to the content-suggestion collaborator
#[async_trait]
pub trait SuggestionPort: Send + Sync {
    async fn suggest(&self, request: &SuggestionRequest)
        -> Result<SuggestionResponse, PortError>;
}
