//! Billing lifecycle orchestration
//!
//! Turns completed jobs into invoices, applies payments, opens disputes, and
//! sweeps for overdue invoices. Everything here is re-runnable: creates are
//! existence-checked and derived state is recomputed from the ledger on each
//! call.

pub mod config;
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod pricing;
pub mod stage;
pub mod suggest;

pub use config::LifecycleConfig;
pub use error::LifecycleError;
pub use job::{Job, JobPort, JobStatus};
pub use orchestrator::{BillingOrchestrator, JobBillingOutcome, OverdueSweep, PaymentOutcome};
pub use pricing::PricingRules;
pub use stage::LifecycleStage;
pub use suggest::{SuggestedLine, SuggestionPort, SuggestionRequest, SuggestionResponse};
