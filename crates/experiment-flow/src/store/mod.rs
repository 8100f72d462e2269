//! Persistence seam for participant state.
//!
//! The experiment keeps three document trees, laid out the way the
//! deployed database is:
//!
//! - `workers/{workerId}` — one [`ParticipantRecord`] per participant
//! - `responses/{workerId}/{trial}` — one [`TrialResponse`] per trial
//! - `survey/{workerId}` — strategy plus numeracy answers
//!
//! Writes that race under concurrent duplicate submissions are expressed
//! as conditional primitives: participant creation fails when the
//! document already exists, and trial-response writes refuse to
//! overwrite a settled payout. Implementations must make these checks
//! atomic; no caller reads and then conditionally writes.

mod firebase;
mod memory;

pub use firebase::RealtimeDbClient;
pub use memory::MemoryStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::participant::ParticipantRecord;
use crate::response::{TrialKey, TrialResponse};
use crate::survey::SurveyRecord;

/// Failure modes of store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write lost a race with a concurrent writer.
    #[error("document modified concurrently: {0}")]
    Conflict(String),

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// The store API rejected the request.
    #[error("store API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body from the API.
        message: String,
    },

    /// A stored document failed to deserialize.
    #[error("malformed document at {path}: {message}")]
    Malformed {
        /// Document path.
        path: String,
        /// Deserialization error.
        message: String,
    },
}

/// Result of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The guard failed: the document already exists, or the stored
    /// response is already settled.
    Rejected,
}

impl WriteOutcome {
    pub fn written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

/// Document store operations the session layer needs.
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    async fn fetch_participant(
        &self,
        worker_id: &str,
    ) -> Result<Option<ParticipantRecord>, StoreError>;

    /// Create the participant document only if none exists.
    async fn create_participant(
        &self,
        record: &ParticipantRecord,
    ) -> Result<WriteOutcome, StoreError>;

    /// Unconditionally replace the participant document. Used by testing
    /// mode, where re-registration is allowed.
    async fn put_participant(&self, record: &ParticipantRecord) -> Result<(), StoreError>;

    /// Record the settled bonus on an existing participant document.
    async fn record_bonus(&self, worker_id: &str, bonus: f64) -> Result<(), StoreError>;

    async fn fetch_response(
        &self,
        worker_id: &str,
        trial: &TrialKey,
    ) -> Result<Option<TrialResponse>, StoreError>;

    /// Write the response unless a settled payout is already stored.
    /// `allow_paid_overwrite` reflects testing mode.
    async fn put_response_if_unpaid(
        &self,
        worker_id: &str,
        trial: &TrialKey,
        response: &TrialResponse,
        allow_paid_overwrite: bool,
    ) -> Result<WriteOutcome, StoreError>;

    /// All responses for a worker, keyed by trial path segment.
    async fn fetch_responses(
        &self,
        worker_id: &str,
    ) -> Result<BTreeMap<String, TrialResponse>, StoreError>;

    async fn fetch_survey(&self, worker_id: &str) -> Result<Option<SurveyRecord>, StoreError>;

    async fn upsert_strategy(
        &self,
        worker_id: &str,
        condition: &str,
        strategy: &str,
    ) -> Result<(), StoreError>;

    async fn upsert_numeracy_item(
        &self,
        worker_id: &str,
        item: usize,
        value: f64,
    ) -> Result<(), StoreError>;
}
