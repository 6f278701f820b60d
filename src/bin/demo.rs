//! Thin demonstration binary: wires one hard-coded experiment through the
//! library entry point. Not a `*.eval.ts`-style file-discovery CLI - the
//! library has no opinion on how a caller assembles jobs and evaluators, and
//! this binary is deliberately the simplest possible caller: load defaults,
//! parse args, set up logging, run, report exit status.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use serde_json::{json, Value};

use evaluatorq::cli::Args;
use evaluatorq::config::{load_defaults_file, resolve_remote_platform_settings, Clients, EvaluatorqConfig};
use evaluatorq::data::{ready, DataSource, HttpDatasetRegistryClient};
use evaluatorq::model::Datapoint;
use evaluatorq::registry::{Evaluator, Job, Registry};
use evaluatorq::upload::HttpRemotePlatformClient;
use evaluatorq::{evaluatorq, logging, run_passed};

struct UppercaseJob;

#[async_trait]
impl Job for UppercaseJob {
    async fn run(&self, datapoint: &Datapoint, _row_index: usize) -> anyhow::Result<Value> {
        let input = datapoint
            .inputs
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(json!(input.to_uppercase()))
    }
}

struct MatchesExpectedEvaluator;

#[async_trait]
impl Evaluator for MatchesExpectedEvaluator {
    async fn run(&self, datapoint: &Datapoint, output: &Value) -> anyhow::Result<Value> {
        let expected = datapoint.expected_output.as_ref();
        Ok(json!(expected == Some(output)))
    }
}

fn demo_dataset() -> Vec<Datapoint> {
    [("hello", "HELLO"), ("rust", "RUST"), ("evaluatorq", "EVALUATORQ")]
        .into_iter()
        .map(|(text, expected)| {
            let mut datapoint = Datapoint::new(HashMap::from([("text".to_string(), json!(text))]));
            datapoint.expected_output = Some(json!(expected));
            datapoint
        })
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::setup_logging(args.format);

    let defaults = load_defaults_file();
    let settings = resolve_remote_platform_settings(&defaults);

    let remote_platform: Option<Arc<dyn evaluatorq::upload::RemotePlatformClient>> =
        settings.api_key.clone().map(|api_key| {
            let client = HttpRemotePlatformClient::new(settings.base_url.clone(), api_key);
            Arc::new(client) as Arc<dyn evaluatorq::upload::RemotePlatformClient>
        });
    let dataset_registry: Option<Arc<dyn evaluatorq::data::DatasetRegistryClient>> =
        settings.api_key.map(|api_key| {
            let client = HttpDatasetRegistryClient::new(settings.base_url.clone(), api_key);
            Arc::new(client) as Arc<dyn evaluatorq::data::DatasetRegistryClient>
        });

    let mut jobs = Registry::new();
    jobs.push("uppercase", Arc::new(UppercaseJob));
    let mut evaluators = Registry::new();
    evaluators.push("matches_expected", Arc::new(MatchesExpectedEvaluator));

    let data = DataSource::Inline(demo_dataset().into_iter().map(ready).collect());

    let mut config = EvaluatorqConfig::new(data, jobs, evaluators);
    config.parallelism = args.parallelism;
    config.show_progress = args.show_progress;
    config.send_results = args.send_results;
    config.description = args.description;
    config.path = args.path;
    config.jsonl_path = args.jsonl_path;
    config.clients = Clients {
        dataset_registry,
        remote_platform,
    };

    match evaluatorq("uppercase-demo", config).await {
        Ok(results) if run_passed(&results) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(error) => {
            tracing::error!(%error, "evaluation run failed");
            ExitCode::FAILURE
        }
    }
}
