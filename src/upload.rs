//! The Uploader (§4.8, §6 wire format): serializes the result tree into the
//! remote platform's wire shape and posts it through a [`RemotePlatformClient`].
//! Upload failures are logged and never fail the run (§4.8).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{instrument, warn};

use crate::model::{EvaluatorqResult, ScoreValue};

/// Collaborator that actually ships a run to the remote platform (ambient,
/// §2 item 11). Kept as a trait object so tests can swap in a fake without
/// touching the network, same shape as [`crate::data::DatasetRegistryClient`].
#[async_trait]
pub trait RemotePlatformClient: Send + Sync {
    async fn upload_run(&self, payload: &UploadPayload) -> anyhow::Result<()>;
}

/// The reqwest-backed implementation used in production.
pub struct HttpRemotePlatformClient {
    http: reqwest::Client,
    base_url: url::Url,
    api_key: String,
}

impl HttpRemotePlatformClient {
    pub fn new(base_url: url::Url, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl RemotePlatformClient for HttpRemotePlatformClient {
    #[instrument(skip_all, fields(base_url = %self.base_url))]
    async fn upload_run(&self, payload: &UploadPayload) -> anyhow::Result<()> {
        let url = self.base_url.join("v2/evaluations/runs")?;
        self.http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Top-level wire payload for one run (§6).
#[derive(Debug, Clone, Serialize)]
pub struct UploadPayload {
    pub run_id: uuid::Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Slash-delimited project/folder path (`"Project/Folder/Subfolder"`),
    /// mapped by the remote platform to a project + folder location (§6).
    pub path: Option<String>,
    pub dataset_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub entries: Vec<UploadEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadEntry {
    pub inputs: std::collections::HashMap<String, Value>,
    pub expected_output: Option<Value>,
    pub job_results: Vec<UploadJobResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadJobResult {
    pub job_name: String,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub evaluator_scores: Vec<UploadEvaluatorScore>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadEvaluatorScore {
    pub evaluator_name: String,
    pub value: Value,
    pub pass: Option<bool>,
    pub explanation: Option<String>,
    pub error: Option<String>,
}

/// Builds the wire payload from the canonical result tree (§6). Primitive and
/// cell score values pass through verbatim; arbitrary structured values are
/// JSON-stringified so the remote schema never has to model an open union.
pub fn build_payload(
    run_id: uuid::Uuid,
    name: &str,
    description: Option<String>,
    path: Option<String>,
    dataset_id: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    results: &EvaluatorqResult,
) -> UploadPayload {
    let entries = results
        .iter()
        .map(|entry| UploadEntry {
            inputs: entry.data_point.inputs.clone(),
            expected_output: entry.data_point.expected_output.clone(),
            job_results: entry
                .job_results
                .iter()
                .map(|job_result| UploadJobResult {
                    job_name: job_result.job_name.clone(),
                    output: job_result.output.clone(),
                    error: job_result.error.clone(),
                    evaluator_scores: job_result
                        .evaluator_scores
                        .iter()
                        .map(|es| UploadEvaluatorScore {
                            evaluator_name: es.evaluator_name.clone(),
                            value: score_value_to_wire(&es.score.value),
                            pass: es.score.pass,
                            explanation: es.score.explanation.clone(),
                            error: es.error.clone(),
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    UploadPayload {
        run_id,
        name: name.to_string(),
        description,
        path,
        dataset_id,
        started_at,
        completed_at,
        entries,
    }
}

fn score_value_to_wire(value: &ScoreValue) -> Value {
    match value {
        ScoreValue::Bool(b) => Value::Bool(*b),
        ScoreValue::Num(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ScoreValue::Str(s) => Value::String(s.clone()),
        ScoreValue::Cell(cell) => serde_json::to_value(cell).unwrap_or(Value::Null),
        // Arbitrary structured values are stringified (§6: "non-primitive,
        // non-cell values are JSON-stringified before upload").
        ScoreValue::Raw(raw) => Value::String(raw.to_string()),
    }
}

/// Uploads `payload` through `client`, logging (not propagating) a transport
/// failure - a failed upload never fails the run (§4.8).
#[instrument(skip_all, fields(name = %payload.name))]
pub async fn upload(client: &dyn RemotePlatformClient, payload: &UploadPayload) {
    if let Err(error) = client.upload_run(payload).await {
        warn!(%error, "failed to upload evaluation run to remote platform");
    }
}
