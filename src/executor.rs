//! The Executor (§4.4): fans datapoints out under a bounded-parallelism
//! semaphore while running jobs and evaluators strictly sequentially within
//! each datapoint, then reassembles the result tree in input order.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{instrument, warn};

use crate::model::{Datapoint, EvaluatorScore, EvaluatorqEntry, EvaluatorqResult, JobResult};
use crate::normalize::normalize_score;
use crate::registry::{EvaluatorRegistry, JobRegistry};

/// Bounded-parallelism knob (§4.4: "an integer `parallelism`... default 1, domain [1, ∞)").
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub parallelism: usize,
    /// Render a `indicatif` progress bar to stderr as datapoints complete.
    pub show_progress: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            parallelism: 1,
            show_progress: false,
        }
    }
}

/// Runs every job against every datapoint, then every evaluator against every
/// (datapoint, job) output, under the concurrency bound in `config`.
#[instrument(skip_all, fields(datapoints = datapoints.len(), jobs = jobs.len(), evaluators = evaluators.len(), parallelism = config.parallelism))]
pub async fn execute(
    jobs: Arc<JobRegistry>,
    evaluators: Arc<EvaluatorRegistry>,
    datapoints: Vec<Datapoint>,
    config: ExecutorConfig,
) -> EvaluatorqResult {
    let parallelism = config.parallelism.max(1);
    let semaphore = Arc::new(Semaphore::new(parallelism));
    let mut join_set: JoinSet<(usize, EvaluatorqEntry)> = JoinSet::new();
    let total = datapoints.len();

    let progress = config.show_progress.then(|| {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40} {pos}/{len} datapoints ({elapsed})")
        {
            bar.set_style(style);
        }
        bar
    });

    for (index, datapoint) in datapoints.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let jobs = jobs.clone();
        let evaluators = evaluators.clone();

        join_set.spawn(async move {
            // Held for the task's whole lifetime: this is what bounds in-flight
            // datapoint tasks to `parallelism` (§5 "Backpressure"). The
            // semaphore is never closed, so this only fails if the runtime is
            // shutting down underneath us - nothing useful to do but proceed.
            let _permit = semaphore.acquire_owned().await.ok();
            let entry = run_datapoint(&jobs, &evaluators, datapoint, index).await;
            (index, entry)
        });
    }

    let mut ordered: Vec<Option<EvaluatorqEntry>> = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, entry)) => {
                if ordered.len() <= index {
                    ordered.resize_with(index + 1, || None);
                }
                ordered[index] = Some(entry);
            }
            Err(join_error) => {
                // A datapoint task panicking is an internal bug, not a job/evaluator
                // failure - those are already caught inside `run_datapoint`. We log
                // and drop it rather than propagating, consistent with "A thrown job
                // or evaluator never propagates out of its per-datapoint task" (§4.4).
                warn!(%join_error, "datapoint task panicked; dropping its result");
            }
        }
        if let Some(ref bar) = progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    ordered.into_iter().flatten().collect()
}

#[instrument(skip_all, fields(row_index))]
async fn run_datapoint(
    jobs: &JobRegistry,
    evaluators: &EvaluatorRegistry,
    datapoint: Datapoint,
    row_index: usize,
) -> EvaluatorqEntry {
    let mut job_results = Vec::with_capacity(jobs.len());

    for named_job in jobs.iter() {
        let job_outcome = named_job.handler.run(&datapoint, row_index).await;

        let (output, job_error) = match job_outcome {
            Ok(Value::Null) => (None, None),
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error.to_string())),
        };

        // Evaluators run strictly sequentially, in registration order, against
        // this job's output (§4.4, §5): a later evaluator may rely on a
        // side-effectful tracing context the job call left behind, so this is
        // not just a convenient default.
        let output_value = output.clone().unwrap_or(Value::Null);
        let mut evaluator_scores = Vec::with_capacity(evaluators.len());
        for named_evaluator in evaluators.iter() {
            let score = if let Some(job_error) = &job_error {
                EvaluatorScore::failed(&named_evaluator.name, "job failed", job_error.clone())
            } else {
                match named_evaluator.handler.run(&datapoint, &output_value).await {
                    Ok(raw) => EvaluatorScore {
                        evaluator_name: named_evaluator.name.clone(),
                        score: normalize_score(raw),
                        error: None,
                    },
                    Err(error) => {
                        EvaluatorScore::failed(&named_evaluator.name, "evaluator failed", error.to_string())
                    }
                }
            };
            evaluator_scores.push(score);
        }

        job_results.push(JobResult {
            job_name: named_job.name.clone(),
            output,
            error: job_error,
            evaluator_scores,
        });
    }

    EvaluatorqEntry {
        data_point: datapoint,
        job_results,
    }
}
