//! REST client for a Firebase-style realtime database.
//!
//! Documents live at `{base}/{path}.json`. Conditional writes use the
//! ETag protocol: a GET with `X-Firebase-ETag: true` returns the current
//! tag, and a PUT with `if-match` fails with 412 Precondition Failed if
//! the document changed in between. That gives the guarded writes of
//! [`ExperimentStore`] real atomicity instead of read-then-write.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::debug;

use super::{ExperimentStore, StoreError, WriteOutcome};
use crate::config::DatabaseConfig;
use crate::participant::ParticipantRecord;
use crate::response::{TrialKey, TrialResponse};
use crate::survey::SurveyRecord;

/// ETag value of an absent document.
const NULL_ETAG: &str = "null_etag";

/// Realtime-database client.
#[derive(Clone)]
pub struct RealtimeDbClient {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RealtimeDbClient {
    /// Create a client for the database at `base_url`.
    pub fn new(base_url: &str, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(&config.url, config.auth_token.clone())
    }

    fn url(&self, path: &str) -> String {
        match &self.auth_token {
            Some(token) => format!("{}/{}.json?auth={}", self.base_url, path, token),
            None => format!("{}/{}.json", self.base_url, path),
        }
    }

    async fn error_from(path: &str, response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        debug!(path, status, "store request failed");
        StoreError::Api { status, message }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, StoreError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::error_from(path, response).await);
        }
        let value: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::Malformed {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    /// GET a document together with its ETag.
    async fn get_with_etag(&self, path: &str) -> Result<(Option<Value>, String), StoreError> {
        let response = self
            .client
            .get(self.url(path))
            .header("X-Firebase-ETag", "true")
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::error_from(path, response).await);
        }
        let etag = response
            .headers()
            .get("ETag")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(NULL_ETAG)
            .to_string();
        let value: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let doc = if value.is_null() { None } else { Some(value) };
        Ok((doc, etag))
    }

    /// PUT guarded by the ETag observed beforehand.
    async fn put_if_match(
        &self,
        path: &str,
        etag: &str,
        body: &impl Serialize,
    ) -> Result<WriteOutcome, StoreError> {
        let response = self
            .client
            .put(self.url(path))
            .header("if-match", etag)
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Ok(WriteOutcome::Rejected);
        }
        if !response.status().is_success() {
            return Err(Self::error_from(path, response).await);
        }
        Ok(WriteOutcome::Written)
    }

    async fn put_json(&self, path: &str, body: &impl Serialize) -> Result<(), StoreError> {
        let response = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::error_from(path, response).await);
        }
        Ok(())
    }

    /// Shallow merge into a document. Keys containing `/` update nested
    /// paths, per the realtime-database multi-path update rules.
    async fn patch_json(&self, path: &str, body: &Value) -> Result<(), StoreError> {
        let response = self
            .client
            .patch(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Self::error_from(path, response).await);
        }
        Ok(())
    }

    fn worker_path(worker_id: &str) -> String {
        format!("workers/{worker_id}")
    }

    fn response_path(worker_id: &str, trial: &TrialKey) -> String {
        format!("responses/{worker_id}/{trial}")
    }

    fn survey_path(worker_id: &str) -> String {
        format!("survey/{worker_id}")
    }
}

#[async_trait]
impl ExperimentStore for RealtimeDbClient {
    async fn fetch_participant(
        &self,
        worker_id: &str,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        self.get_json(&Self::worker_path(worker_id)).await
    }

    async fn create_participant(
        &self,
        record: &ParticipantRecord,
    ) -> Result<WriteOutcome, StoreError> {
        let path = Self::worker_path(&record.worker_id);
        let (existing, etag) = self.get_with_etag(&path).await?;
        if existing.is_some() {
            return Ok(WriteOutcome::Rejected);
        }
        // A 412 here means someone registered between the GET and the
        // PUT; treat it the same as an existing document.
        self.put_if_match(&path, &etag, record).await
    }

    async fn put_participant(&self, record: &ParticipantRecord) -> Result<(), StoreError> {
        self.put_json(&Self::worker_path(&record.worker_id), record)
            .await
    }

    async fn record_bonus(&self, worker_id: &str, bonus: f64) -> Result<(), StoreError> {
        self.patch_json(&Self::worker_path(worker_id), &json!({ "bonus": bonus }))
            .await
    }

    async fn fetch_response(
        &self,
        worker_id: &str,
        trial: &TrialKey,
    ) -> Result<Option<TrialResponse>, StoreError> {
        self.get_json(&Self::response_path(worker_id, trial)).await
    }

    async fn put_response_if_unpaid(
        &self,
        worker_id: &str,
        trial: &TrialKey,
        response: &TrialResponse,
        allow_paid_overwrite: bool,
    ) -> Result<WriteOutcome, StoreError> {
        let path = Self::response_path(worker_id, trial);
        let (existing, etag) = self.get_with_etag(&path).await?;
        if let Some(doc) = existing
            && !allow_paid_overwrite
        {
            let paid = doc.get("pay").and_then(Value::as_f64).unwrap_or(-1.0) >= 0.0;
            if paid {
                return Ok(WriteOutcome::Rejected);
            }
        }
        match self.put_if_match(&path, &etag, response).await? {
            WriteOutcome::Written => Ok(WriteOutcome::Written),
            // The document changed under us, so the pay check above is
            // stale. Surface the race instead of guessing.
            WriteOutcome::Rejected => Err(StoreError::Conflict(path)),
        }
    }

    async fn fetch_responses(
        &self,
        worker_id: &str,
    ) -> Result<BTreeMap<String, TrialResponse>, StoreError> {
        Ok(self
            .get_json(&format!("responses/{worker_id}"))
            .await?
            .unwrap_or_default())
    }

    async fn fetch_survey(&self, worker_id: &str) -> Result<Option<SurveyRecord>, StoreError> {
        self.get_json(&Self::survey_path(worker_id)).await
    }

    async fn upsert_strategy(
        &self,
        worker_id: &str,
        condition: &str,
        strategy: &str,
    ) -> Result<(), StoreError> {
        self.patch_json(
            &Self::survey_path(worker_id),
            &json!({
                "workerId": worker_id,
                "condition": condition,
                "strategy": strategy,
            }),
        )
        .await
    }

    async fn upsert_numeracy_item(
        &self,
        worker_id: &str,
        item: usize,
        value: f64,
    ) -> Result<(), StoreError> {
        let mut body = serde_json::Map::new();
        body.insert("workerId".to_string(), json!(worker_id));
        body.insert(format!("numeracy/{item}"), json!(value));
        self.patch_json(&Self::survey_path(worker_id), &Value::Object(body))
            .await
    }
}
