//! The Data Resolver (§4.1): turns whatever the user passed as `data` into a
//! finite, ordered sequence of materialized [`Datapoint`]s.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::EvaluatorqError;
use crate::model::Datapoint;

/// One element of an inline data sequence: a boxed future producing a
/// datapoint, or failing. A "bare datapoint" is represented as an already-
/// resolved future; a "promise" or "thunk" is any other future, matching the
/// spec's "datapoint, a promise of a datapoint, or a thunk returning either".
pub type InlineElement = Pin<Box<dyn Future<Output = anyhow::Result<Datapoint>> + Send>>;

/// Helper to lift a plain datapoint into an [`InlineElement`].
pub fn ready(datapoint: Datapoint) -> InlineElement {
    Box::pin(async move { Ok(datapoint) })
}

/// A single record as returned by the remote dataset registry, before it is
/// turned into a [`Datapoint`] by [`resolve_descriptor`].
#[derive(Debug, Clone)]
pub struct DatasetRecord {
    pub id: String,
    pub inputs: HashMap<String, Value>,
    pub expected_output: Option<Value>,
    /// Top-level `messages`, present when the dataset stores conversation
    /// turns outside of `inputs` (merged in when `include_messages` is set).
    pub messages: Option<Value>,
}

/// One page of a cursor-paginated dataset listing.
#[derive(Debug, Clone)]
pub struct DatasetPage {
    pub records: Vec<DatasetRecord>,
    pub next_cursor: Option<String>,
}

/// The remote dataset registry collaborator (ambient, §2 item 10). Fully
/// materialized before execution by [`resolve_descriptor`]; the core never
/// streams datapoints into the executor, per the "dataset paging" design note.
#[async_trait]
pub trait DatasetRegistryClient: Send + Sync {
    async fn list_page(&self, dataset_id: &str, cursor: Option<&str>) -> anyhow::Result<DatasetPage>;
}

/// The reqwest-backed implementation used in production: pages through a
/// dataset via a `cursor` query parameter until the registry reports none.
pub struct HttpDatasetRegistryClient {
    http: reqwest::Client,
    base_url: url::Url,
    api_key: String,
}

impl HttpDatasetRegistryClient {
    pub fn new(base_url: url::Url, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl DatasetRegistryClient for HttpDatasetRegistryClient {
    #[instrument(skip_all, fields(base_url = %self.base_url, %dataset_id))]
    async fn list_page(&self, dataset_id: &str, cursor: Option<&str>) -> anyhow::Result<DatasetPage> {
        let url = self.base_url.join(&format!("v2/datasets/{dataset_id}/items"))?;
        let mut request = self.http.get(url).bearer_auth(&self.api_key);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }
        let wire: DatasetPageWire = request.send().await?.error_for_status()?.json().await?;
        Ok(DatasetPage {
            records: wire.records.into_iter().map(DatasetRecord::from).collect(),
            next_cursor: wire.next_cursor,
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct DatasetPageWire {
    records: Vec<DatasetRecordWire>,
    next_cursor: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct DatasetRecordWire {
    id: String,
    inputs: HashMap<String, Value>,
    #[serde(default)]
    expected_output: Option<Value>,
    #[serde(default)]
    messages: Option<Value>,
}

impl From<DatasetRecordWire> for DatasetRecord {
    fn from(wire: DatasetRecordWire) -> Self {
        Self {
            id: wire.id,
            inputs: wire.inputs,
            expected_output: wire.expected_output,
            messages: wire.messages,
        }
    }
}

/// What the user passed as `data` (§4.1).
pub enum DataSource {
    Inline(Vec<InlineElement>),
    Descriptor {
        dataset_id: String,
        include_messages: bool,
    },
}

/// Output of the Data Resolver: a materialized datapoint sequence plus an
/// optional dataset identity for the uploader to link back to (§4.1).
pub struct ResolvedData {
    pub datapoints: Vec<Datapoint>,
    pub dataset_id: Option<String>,
}

/// Resolves `source` into a [`ResolvedData`].
///
/// Inline elements that fail are dropped and logged at warn level (I5); this
/// is never fatal. Descriptor resolution can fail fatally on the
/// `include_messages` conflict rule (§4.1) - that propagates as a
/// [`EvaluatorqError::Configuration`].
#[instrument(skip_all)]
pub async fn resolve_data(
    source: DataSource,
    registry_client: Option<&dyn DatasetRegistryClient>,
) -> Result<ResolvedData, EvaluatorqError> {
    match source {
        DataSource::Inline(elements) => Ok(resolve_inline(elements).await),
        DataSource::Descriptor {
            dataset_id,
            include_messages,
        } => {
            let client = registry_client.ok_or_else(|| {
                EvaluatorqError::Configuration(
                    "a dataset descriptor was provided but no dataset registry client is configured"
                        .to_string(),
                )
            })?;
            resolve_descriptor(client, &dataset_id, include_messages).await
        }
    }
}

async fn resolve_inline(elements: Vec<InlineElement>) -> ResolvedData {
    let mut datapoints = Vec::with_capacity(elements.len());
    for (index, element) in elements.into_iter().enumerate() {
        match element.await {
            Ok(datapoint) => datapoints.push(datapoint),
            Err(error) => {
                warn!(index, %error, "dropping datapoint: data future rejected");
            }
        }
    }
    ResolvedData {
        datapoints,
        dataset_id: None,
    }
}

#[instrument(skip(client))]
async fn resolve_descriptor(
    client: &dyn DatasetRegistryClient,
    dataset_id: &str,
    include_messages: bool,
) -> Result<ResolvedData, EvaluatorqError> {
    let mut datapoints = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = client
            .list_page(dataset_id, cursor.as_deref())
            .await
            .map_err(EvaluatorqError::DataResolution)?;
        debug!(records = page.records.len(), "fetched dataset page");

        for record in page.records {
            datapoints.push(record_to_datapoint(record, include_messages)?);
        }

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(ResolvedData {
        datapoints,
        dataset_id: Some(dataset_id.to_string()),
    })
}

fn record_to_datapoint(
    record: DatasetRecord,
    include_messages: bool,
) -> Result<Datapoint, EvaluatorqError> {
    let mut inputs = record.inputs;

    if include_messages {
        if inputs.contains_key("messages") {
            return Err(EvaluatorqError::Configuration(format!(
                "record {} already has `inputs.messages`; cannot merge top-level `messages` when includeMessages is true",
                record.id
            )));
        }
        if let Some(messages) = record.messages {
            inputs.insert("messages".to_string(), messages);
        }
    }

    Ok(Datapoint {
        inputs,
        expected_output: record.expected_output,
        messages: None,
        extra: HashMap::new(),
    })
}

#[cfg(test)]
#[cfg_attr(test, allow(clippy::unwrap_used))]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> DatasetRecord {
        DatasetRecord {
            id: id.to_string(),
            inputs: HashMap::from([("a".to_string(), json!(1))]),
            expected_output: Some(json!("expected")),
            messages: None,
        }
    }

    struct FakeRegistry {
        pages: Vec<DatasetPage>,
    }

    #[async_trait]
    impl DatasetRegistryClient for FakeRegistry {
        async fn list_page(
            &self,
            _dataset_id: &str,
            cursor: Option<&str>,
        ) -> anyhow::Result<DatasetPage> {
            let index: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
            Ok(self.pages[index].clone())
        }
    }

    #[tokio::test]
    async fn inline_resolution_preserves_order() {
        let elements = vec![
            ready(Datapoint::new(HashMap::from([("i".to_string(), json!(0))]))),
            ready(Datapoint::new(HashMap::from([("i".to_string(), json!(1))]))),
            ready(Datapoint::new(HashMap::from([("i".to_string(), json!(2))]))),
        ];
        let resolved = resolve_inline(elements).await;
        let order: Vec<Value> = resolved
            .datapoints
            .iter()
            .map(|dp| dp.inputs["i"].clone())
            .collect();
        assert_eq!(order, vec![json!(0), json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn inline_resolution_drops_rejected_elements_without_halting() {
        let elements: Vec<InlineElement> = vec![
            ready(Datapoint::new(HashMap::from([("i".to_string(), json!(0))]))),
            Box::pin(async { Err(anyhow::anyhow!("boom")) }),
            ready(Datapoint::new(HashMap::from([("i".to_string(), json!(2))]))),
        ];
        let resolved = resolve_inline(elements).await;
        assert_eq!(resolved.datapoints.len(), 2);
        let order: Vec<Value> = resolved
            .datapoints
            .iter()
            .map(|dp| dp.inputs["i"].clone())
            .collect();
        assert_eq!(order, vec![json!(0), json!(2)]);
    }

    #[tokio::test]
    async fn descriptor_resolution_pages_to_exhaustion() {
        let registry = FakeRegistry {
            pages: vec![
                DatasetPage {
                    records: vec![record("r0"), record("r1")],
                    next_cursor: Some("1".to_string()),
                },
                DatasetPage {
                    records: vec![record("r2")],
                    next_cursor: None,
                },
            ],
        };
        let resolved = resolve_descriptor(&registry, "my-dataset", false)
            .await
            .unwrap();
        assert_eq!(resolved.datapoints.len(), 3);
        assert_eq!(resolved.dataset_id, Some("my-dataset".to_string()));
    }

    #[tokio::test]
    async fn include_messages_merges_top_level_messages_into_inputs() {
        let mut rec = record("r0");
        rec.messages = Some(json!([{"role": "user", "content": "hi"}]));
        let registry = FakeRegistry {
            pages: vec![DatasetPage {
                records: vec![rec],
                next_cursor: None,
            }],
        };
        let resolved = resolve_descriptor(&registry, "my-dataset", true)
            .await
            .unwrap();
        assert_eq!(
            resolved.datapoints[0].inputs["messages"],
            json!([{"role": "user", "content": "hi"}])
        );
    }

    #[tokio::test]
    async fn include_messages_conflict_fails_the_whole_run() {
        let mut rec = record("offending-record");
        rec.inputs
            .insert("messages".to_string(), json!("already here"));
        rec.messages = Some(json!([{"role": "user", "content": "hi"}]));
        let registry = FakeRegistry {
            pages: vec![DatasetPage {
                records: vec![rec],
                next_cursor: None,
            }],
        };
        let err = resolve_descriptor(&registry, "my-dataset", true)
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("includeMessages") || message.contains("include"));
        assert!(message.contains("offending-record"));
    }
}
