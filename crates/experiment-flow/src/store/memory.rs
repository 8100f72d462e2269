//! In-process store used by tests and the simulate command.
//!
//! All conditional semantics hold under a single mutex, so the guarded
//! writes are atomic by construction.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ExperimentStore, StoreError, WriteOutcome};
use crate::participant::ParticipantRecord;
use crate::response::{TrialKey, TrialResponse};
use crate::survey::SurveyRecord;

#[derive(Default)]
struct Inner {
    workers: HashMap<String, ParticipantRecord>,
    responses: HashMap<String, BTreeMap<String, TrialResponse>>,
    surveys: HashMap<String, SurveyRecord>,
}

/// HashMap-backed store with the same conditional-write semantics as the
/// remote client.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Lock poisoning only happens if a holder panicked; tests want
        // the underlying panic, not a masked one.
        self.inner.lock().expect("memory store lock poisoned")
    }
}

#[async_trait]
impl ExperimentStore for MemoryStore {
    async fn fetch_participant(
        &self,
        worker_id: &str,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        Ok(self.lock().workers.get(worker_id).cloned())
    }

    async fn create_participant(
        &self,
        record: &ParticipantRecord,
    ) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.lock();
        if inner.workers.contains_key(&record.worker_id) {
            return Ok(WriteOutcome::Rejected);
        }
        inner
            .workers
            .insert(record.worker_id.clone(), record.clone());
        Ok(WriteOutcome::Written)
    }

    async fn put_participant(&self, record: &ParticipantRecord) -> Result<(), StoreError> {
        self.lock()
            .workers
            .insert(record.worker_id.clone(), record.clone());
        Ok(())
    }

    async fn record_bonus(&self, worker_id: &str, bonus: f64) -> Result<(), StoreError> {
        // Patch semantics: a missing document stays missing. The service
        // verifies the participant exists before settling.
        if let Some(worker) = self.lock().workers.get_mut(worker_id) {
            worker.bonus = bonus;
        }
        Ok(())
    }

    async fn fetch_response(
        &self,
        worker_id: &str,
        trial: &TrialKey,
    ) -> Result<Option<TrialResponse>, StoreError> {
        Ok(self
            .lock()
            .responses
            .get(worker_id)
            .and_then(|trials| trials.get(&trial.to_string()))
            .cloned())
    }

    async fn put_response_if_unpaid(
        &self,
        worker_id: &str,
        trial: &TrialKey,
        response: &TrialResponse,
        allow_paid_overwrite: bool,
    ) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.lock();
        let trials = inner.responses.entry(worker_id.to_string()).or_default();
        let key = trial.to_string();
        if let Some(stored) = trials.get(&key)
            && stored.is_paid()
            && !allow_paid_overwrite
        {
            return Ok(WriteOutcome::Rejected);
        }
        trials.insert(key, response.clone());
        Ok(WriteOutcome::Written)
    }

    async fn fetch_responses(
        &self,
        worker_id: &str,
    ) -> Result<BTreeMap<String, TrialResponse>, StoreError> {
        Ok(self
            .lock()
            .responses
            .get(worker_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_survey(&self, worker_id: &str) -> Result<Option<SurveyRecord>, StoreError> {
        Ok(self.lock().surveys.get(worker_id).cloned())
    }

    async fn upsert_strategy(
        &self,
        worker_id: &str,
        condition: &str,
        strategy: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .surveys
            .entry(worker_id.to_string())
            .or_insert_with(|| SurveyRecord {
                worker_id: worker_id.to_string(),
                ..Default::default()
            });
        record.condition = Some(condition.to_string());
        record.strategy = Some(strategy.to_string());
        Ok(())
    }

    async fn upsert_numeracy_item(
        &self,
        worker_id: &str,
        item: usize,
        value: f64,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let record = inner
            .surveys
            .entry(worker_id.to_string())
            .or_insert_with(|| SurveyRecord {
                worker_id: worker_id.to_string(),
                ..Default::default()
            });
        record.numeracy.insert(item.to_string(), value);
        Ok(())
    }
}
