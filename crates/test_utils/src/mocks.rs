//! Mock implementations of the external-collaborator ports
//!
//! Scripted, in-memory stand-ins: responses are queued up front and handed
//! out in order. When the queue runs dry each mock falls back to a benign
//! default so tests only script the interesting calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use core_kernel::{AccountId, JobId, PortError};
use domain_ledger::AccountIntegration;
use domain_lifecycle::{Job, JobPort, PricingRules, SuggestionPort, SuggestionRequest, SuggestionResponse};
use domain_reconciliation::{AccountingPort, ExternalInvoice, ExternalPayment, TokenRefresh};

use crate::fixtures::pricing_rules;

/// Job port backed by a map of jobs
pub struct MockJobPort {
    jobs: Mutex<HashMap<JobId, Job>>,
    rules: Mutex<PricingRules>,
}

impl Default for MockJobPort {
    fn default() -> Self {
        Self::new()
    }
}

impl MockJobPort {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            rules: Mutex::new(pricing_rules()),
        }
    }

    pub fn add_job(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    pub fn set_rules(&self, rules: PricingRules) {
        *self.rules.lock().unwrap() = rules;
    }
}

#[async_trait]
impl JobPort for MockJobPort {
    async fn find_job(
        &self,
        account_id: AccountId,
        job_id: JobId,
    ) -> Result<Option<Job>, PortError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .get(&job_id)
            .filter(|j| j.account_id == account_id)
            .cloned())
    }

    async fn pricing_rules(&self, _account_id: AccountId) -> Result<PricingRules, PortError> {
        Ok(self.rules.lock().unwrap().clone())
    }
}

/// Suggestion port with scripted responses
///
/// An empty script behaves like an unreachable collaborator, which drives
/// the orchestrator onto its deterministic fallback.
#[derive(Default)]
pub struct MockSuggestionPort {
    script: Mutex<Vec<Result<SuggestionResponse, PortError>>>,
    last_request: Mutex<Option<SuggestionRequest>>,
    pub calls: AtomicUsize,
}

impl MockSuggestionPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(&self, response: SuggestionResponse) {
        self.script.lock().unwrap().push(Ok(response));
    }

    pub fn fail_with(&self, error: PortError) {
        self.script.lock().unwrap().push(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, for asserting on outbound content
    pub fn last_request(&self) -> Option<SuggestionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl SuggestionPort for MockSuggestionPort {
    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> Result<SuggestionResponse, PortError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(PortError::service_unavailable("suggestion service down"));
        }
        script.remove(0)
    }
}

/// Accounting port with scripted pushes, pulls, and refreshes
#[derive(Default)]
pub struct MockAccountingPort {
    push_script: Mutex<Vec<Result<String, PortError>>>,
    pull_script: Mutex<Vec<Vec<ExternalPayment>>>,
    refresh_script: Mutex<Vec<Result<TokenRefresh, PortError>>>,
    pub push_calls: AtomicUsize,
    pub pull_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
}

impl MockAccountingPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next push result; unscripted pushes succeed with a fresh id
    pub fn push_result(&self, result: Result<String, PortError>) {
        self.push_script.lock().unwrap().push(result);
    }

    /// Scripts the next pull batch; unscripted pulls return no payments
    pub fn pull_batch(&self, batch: Vec<ExternalPayment>) {
        self.pull_script.lock().unwrap().push(batch);
    }

    /// Scripts the next refresh result; unscripted refreshes succeed
    pub fn refresh_result(&self, result: Result<TokenRefresh, PortError>) {
        self.refresh_script.lock().unwrap().push(result);
    }
}

#[async_trait]
impl AccountingPort for MockAccountingPort {
    async fn push_invoice(
        &self,
        _integration: &AccountIntegration,
        _invoice: &ExternalInvoice,
    ) -> Result<String, PortError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.push_script.lock().unwrap();
        if script.is_empty() {
            return Ok(format!("ext-{}", Uuid::new_v4()));
        }
        script.remove(0)
    }

    async fn pull_payments(
        &self,
        _integration: &AccountIntegration,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ExternalPayment>, PortError> {
        self.pull_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.pull_script.lock().unwrap();
        if script.is_empty() {
            return Ok(Vec::new());
        }
        Ok(script.remove(0))
    }

    async fn refresh_token(
        &self,
        _integration: &AccountIntegration,
    ) -> Result<TokenRefresh, PortError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.refresh_script.lock().unwrap();
        if script.is_empty() {
            return Ok(TokenRefresh {
                access_token: "refreshed-access".to_string(),
                refresh_token: "refreshed-refresh".to_string(),
                expires_at: Utc::now() + Duration::hours(1),
            });
        }
        script.remove(0)
    }
}
