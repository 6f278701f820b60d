//! Black-box integration tests against the public `evaluatorq` entry point,
//! kept separate from the per-module unit tests in `src/`.
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};

use evaluatorq::data::{ready, DatasetPage, DatasetRecord, DatasetRegistryClient, DataSource};
use evaluatorq::model::Datapoint;
use evaluatorq::registry::{Evaluator, Job, Registry};
use evaluatorq::{run_passed, Clients, EvaluatorqConfig};

struct EchoJob;
#[async_trait]
impl Job for EchoJob {
    async fn run(&self, datapoint: &Datapoint, _row_index: usize) -> anyhow::Result<Value> {
        Ok(datapoint.inputs["text"].clone())
    }
}

struct MixedScoreEvaluator;
#[async_trait]
impl Evaluator for MixedScoreEvaluator {
    async fn run(&self, datapoint: &Datapoint, _output: &Value) -> anyhow::Result<Value> {
        // Returns a different score kind depending on the row, exercising the
        // aggregator's "[mixed]" reduction end to end.
        match datapoint.inputs["text"].as_str().unwrap_or_default() {
            "numeric" => Ok(json!(0.5)),
            "boolean" => Ok(json!(true)),
            other => Ok(json!(other)),
        }
    }
}

#[tokio::test]
async fn mixed_score_kinds_do_not_break_a_run() {
    let mut jobs = Registry::new();
    jobs.push("echo", Arc::new(EchoJob));
    let mut evaluators = Registry::new();
    evaluators.push("mixed", Arc::new(MixedScoreEvaluator));

    let data = DataSource::Inline(
        ["numeric", "boolean", "stringy"]
            .into_iter()
            .map(|text| {
                ready(Datapoint::new(HashMap::from([(
                    "text".to_string(),
                    json!(text),
                )])))
            })
            .collect(),
    );

    let mut config = EvaluatorqConfig::new(data, jobs, evaluators);
    config.print = false;

    let results = evaluatorq::evaluatorq("mixed-kinds", config).await.unwrap();
    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn parallelism_bound_is_honored_end_to_end() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    struct SlowJob {
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }
    #[async_trait]
    impl Job for SlowJob {
        async fn run(&self, _datapoint: &Datapoint, _row_index: usize) -> anyhow::Result<Value> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    }

    let mut jobs = Registry::new();
    jobs.push(
        "slow",
        Arc::new(SlowJob {
            in_flight: in_flight.clone(),
            max_in_flight: max_in_flight.clone(),
        }),
    );
    let evaluators = Registry::new();

    let data = DataSource::Inline(
        (0..8)
            .map(|i| ready(Datapoint::new(HashMap::from([("i".to_string(), json!(i))]))))
            .collect(),
    );

    let mut config = EvaluatorqConfig::new(data, jobs, evaluators);
    config.print = false;
    config.parallelism = 2;

    let start = Instant::now();
    let _results = evaluatorq::evaluatorq("parallelism-bound", config)
        .await
        .unwrap();

    assert!(max_in_flight.load(Ordering::SeqCst) <= 2);
    assert!(start.elapsed() >= Duration::from_millis(70));
}

struct FakeRegistry {
    page: DatasetPage,
}

#[async_trait]
impl DatasetRegistryClient for FakeRegistry {
    async fn list_page(&self, _dataset_id: &str, _cursor: Option<&str>) -> anyhow::Result<DatasetPage> {
        Ok(self.page.clone())
    }
}

#[tokio::test]
async fn dataset_descriptor_include_messages_conflict_fails_the_whole_run() {
    let mut record = DatasetRecord {
        id: "bad-record".to_string(),
        inputs: HashMap::from([("messages".to_string(), json!("already present"))]),
        expected_output: None,
        messages: None,
    };
    record.messages = Some(json!([{"role": "user", "content": "hi"}]));

    let registry = FakeRegistry {
        page: DatasetPage {
            records: vec![record],
            next_cursor: None,
        },
    };

    let mut jobs = Registry::new();
    jobs.push("echo", Arc::new(EchoJob));
    let evaluators = Registry::new();
    let data = DataSource::Descriptor {
        dataset_id: "conflicting-dataset".to_string(),
        include_messages: true,
    };

    let mut config = EvaluatorqConfig::new(data, jobs, evaluators);
    config.print = false;
    config.clients = Clients {
        dataset_registry: Some(Arc::new(registry)),
        remote_platform: None,
    };

    let error = evaluatorq::evaluatorq("conflict", config).await.unwrap_err();
    assert!(error.to_string().contains("bad-record"));
}

#[tokio::test]
async fn dataset_descriptor_without_a_configured_client_is_a_configuration_error() {
    let mut jobs = Registry::new();
    jobs.push("echo", Arc::new(EchoJob));
    let evaluators = Registry::new();
    let data = DataSource::Descriptor {
        dataset_id: "whatever".to_string(),
        include_messages: false,
    };

    let config = EvaluatorqConfig::new(data, jobs, evaluators);
    let error = evaluatorq::evaluatorq("no-client", config).await.unwrap_err();
    assert!(matches!(error, evaluatorq::EvaluatorqError::Configuration(_)));
}

#[tokio::test]
async fn empty_evaluators_still_produces_job_results() {
    let mut jobs = Registry::new();
    jobs.push("echo", Arc::new(EchoJob));
    let evaluators = Registry::new();

    let data = DataSource::Inline(vec![ready(Datapoint::new(HashMap::from([(
        "text".to_string(),
        json!("hi"),
    )])))]);

    let mut config = EvaluatorqConfig::new(data, jobs, evaluators);
    config.print = false;

    let results = evaluatorq::evaluatorq("no-evaluators", config).await.unwrap();
    assert_eq!(results[0].job_results[0].evaluator_scores.len(), 0);
    assert!(run_passed(&results));
}

#[tokio::test]
async fn parallelism_exceeding_data_length_runs_everything_concurrently_without_deadlock() {
    let mut jobs = Registry::new();
    jobs.push("echo", Arc::new(EchoJob));
    let evaluators = Registry::new();

    let data = DataSource::Inline(vec![ready(Datapoint::new(HashMap::from([(
        "text".to_string(),
        json!("solo"),
    )])))]);

    let mut config = EvaluatorqConfig::new(data, jobs, evaluators);
    config.print = false;
    config.parallelism = 64;

    let results = evaluatorq::evaluatorq("over-parallel", config).await.unwrap();
    assert_eq!(results.len(), 1);
}
