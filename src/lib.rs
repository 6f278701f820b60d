//! Offline evaluation harness: datasets x jobs x evaluators under bounded
//! concurrency (§1). [`evaluatorq`] is the single entry point; everything
//! else is a component it wires together - Data Resolver, Executor,
//! Aggregator, Presenter, Uploader.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod executor;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod present;
pub mod registry;
pub mod upload;

use std::io::Write as _;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::instrument;

pub use config::{Clients, EvaluatorqConfig};
pub use error::EvaluatorqError;
pub use model::{run_passed, EvaluatorqResult};

/// Runs one evaluation: resolves `config.data` into datapoints, fans every
/// job and evaluator out over them under `config.parallelism`, then prints
/// and/or uploads the result tree according to `config`.
///
/// `name` identifies the run to the remote platform and appears in logs; it
/// has no effect on scoring.
#[instrument(skip_all, fields(name = %name, run_id = tracing::field::Empty))]
pub async fn evaluatorq(
    name: &str,
    config: EvaluatorqConfig,
) -> Result<EvaluatorqResult, EvaluatorqError> {
    if config.jobs.is_empty() {
        return Err(EvaluatorqError::Configuration("jobs must not be empty".to_string()));
    }
    if config.send_results && config.clients.remote_platform.is_none() {
        return Err(EvaluatorqError::Configuration(
            "send_results was requested but no remote platform client is configured".to_string(),
        ));
    }

    let run_id = uuid::Uuid::now_v7();
    tracing::Span::current().record("run_id", tracing::field::display(run_id));
    let started_at = Utc::now();
    let start = Instant::now();

    let resolved = data::resolve_data(config.data, config.clients.dataset_registry.as_deref()).await?;

    let jobs = Arc::new(config.jobs);
    let evaluators = Arc::new(config.evaluators);
    let results = executor::execute(
        jobs,
        evaluators,
        resolved.datapoints,
        executor::ExecutorConfig {
            parallelism: config.parallelism,
            show_progress: config.show_progress,
        },
    )
    .await;

    let elapsed = start.elapsed();
    tracing::info!(
        datapoints = results.len(),
        elapsed_ms = elapsed.as_millis() as u64,
        passed = run_passed(&results),
        "evaluation run complete"
    );

    if config.print {
        let rendered = present::render(&results, elapsed);
        println!("{rendered}");
    }

    if let Some(jsonl_path) = &config.jsonl_path {
        write_jsonl(jsonl_path, &results)?;
    }

    if config.send_results {
        // Presence of a remote client was already validated above.
        let remote = config
            .clients
            .remote_platform
            .as_ref()
            .ok_or_else(|| EvaluatorqError::Internal("remote platform client vanished after validation".to_string()))?;
        let completed_at = Utc::now();
        let payload = upload::build_payload(
            run_id,
            name,
            config.description.clone(),
            config.path.clone(),
            resolved.dataset_id.clone(),
            started_at,
            completed_at,
            &results,
        );
        upload::upload(remote.as_ref(), &payload).await;
    }

    Ok(results)
}

fn write_jsonl(path: &str, results: &EvaluatorqResult) -> Result<(), EvaluatorqError> {
    let mut file = std::fs::File::create(path)?;
    for entry in results {
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}
