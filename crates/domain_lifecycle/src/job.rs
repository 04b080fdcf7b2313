//! Jobs and the job-execution port
//!
//! Jobs live in the job-execution collaborator; the lifecycle never stores
//! them. Job detail is always looked up through [`JobPort`], never trusted
//! from the triggering event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use core_kernel::{AccountId, CustomerId, JobId, PortError};

use crate::error::LifecycleError;
use crate::pricing::PricingRules;

/// Job status as reported by the job-execution collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Scheduled => "SCHEDULED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for JobStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(JobStatus::Scheduled),
            "IN_PROGRESS" => Ok(JobStatus::InProgress),
            "COMPLETED" | "DONE" => Ok(JobStatus::Completed),
            "CANCELLED" | "CANCELED" => Ok(JobStatus::Cancelled),
            other => Err(LifecycleError::invalid_state(format!(
                "unknown job status: {}",
                other
            ))),
        }
    }
}

/// A field-service job as seen by the billing lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub account_id: AccountId,
    pub customer_id: Option<CustomerId>,
    pub status: JobStatus,
    /// Short description of the work performed
    pub description: String,
    /// Serviced area, when the account prices per area
    pub area: Option<Decimal>,
    /// Labor hours, when the account prices per hour
    pub hours_worked: Option<Decimal>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

/// Port to the job-execution collaborator
#[async_trait]
pub trait JobPort: Send + Sync {
    /// Looks up a job, scoped to the account
    async fn find_job(&self, account_id: AccountId, job_id: JobId)
        -> Result<Option<Job>, PortError>;

    /// Returns the account's configured pricing rules
    async fn pricing_rules(&self, account_id: AccountId) -> Result<PricingRules, PortError>;
}
