//! The Aggregator (§4.6): collapses one column of scores - every score a
//! given evaluator produced for a given job, across every datapoint - into a
//! single summary cell, picking the reduction by the scores' common kind.

use std::collections::HashMap;
use std::fmt;

use crate::model::{EvaluatorqResult, ScoreKind, ScoreValue};

/// Mean and standard error of a run of numeric scores. Exposed on the
/// aggregate but not rendered by the default table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluatorStats {
    pub mean: f64,
    pub stderr: f64,
}

impl fmt::Display for EvaluatorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} \u{00b1} {:.2}", self.mean, self.stderr)
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_deviation(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// The reduced value of one (job, evaluator) column (§4.6).
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateValue {
    /// All scores in the column were numeric.
    Numeric(EvaluatorStats),
    /// All scores in the column were boolean; the percentage that passed.
    PassRate(f64),
    /// All scores in the column were strings.
    StringLike,
    /// All scores in the column were structured (cells or arbitrary objects).
    Structured,
    /// The column mixed two or more score kinds.
    Mixed,
    /// The column has no scores to reduce (e.g. zero datapoints).
    Empty,
}

impl fmt::Display for AggregateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateValue::Numeric(stats) => write!(f, "{:.2}", stats.mean),
            AggregateValue::PassRate(pct) => write!(f, "{pct:.1}%"),
            AggregateValue::StringLike => write!(f, "[string]"),
            AggregateValue::Structured => write!(f, "[structured]"),
            AggregateValue::Mixed => write!(f, "[mixed]"),
            AggregateValue::Empty => write!(f, "-"),
        }
    }
}

/// One reduced column: which (job, evaluator) pair it summarizes, and its value.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub job_name: String,
    pub evaluator_name: String,
    pub value: AggregateValue,
}

struct Column {
    job_name: String,
    evaluator_name: String,
    kinds: Vec<ScoreKind>,
    bool_passes: Vec<bool>,
    numbers: Vec<f64>,
}

/// Reduces every (job, evaluator) column in `results` to one [`Aggregate`]
/// each, preserving the order columns were first encountered in the result
/// tree (which, since the executor runs jobs/evaluators in registration
/// order, matches the job and evaluator registries).
pub fn aggregate(results: &EvaluatorqResult) -> Vec<Aggregate> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut columns: HashMap<(String, String), Column> = HashMap::new();

    for entry in results {
        for job_result in &entry.job_results {
            for evaluator_score in &job_result.evaluator_scores {
                let key = (
                    job_result.job_name.clone(),
                    evaluator_score.evaluator_name.clone(),
                );
                let column = columns.entry(key.clone()).or_insert_with(|| {
                    order.push(key.clone());
                    Column {
                        job_name: job_result.job_name.clone(),
                        evaluator_name: evaluator_score.evaluator_name.clone(),
                        kinds: Vec::new(),
                        bool_passes: Vec::new(),
                        numbers: Vec::new(),
                    }
                });

                if evaluator_score.error.is_none() {
                    let score = &evaluator_score.score;
                    column.kinds.push(score.value.kind());
                    match &score.value {
                        ScoreValue::Bool(b) => column.bool_passes.push(score.pass.unwrap_or(*b)),
                        ScoreValue::Num(n) => column.numbers.push(*n),
                        _ => {}
                    }
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let column = columns.remove(&key)?;
            let value = reduce_column(&column);
            Some(Aggregate {
                job_name: column.job_name,
                evaluator_name: column.evaluator_name,
                value,
            })
        })
        .collect()
}

fn reduce_column(column: &Column) -> AggregateValue {
    if column.kinds.is_empty() {
        return AggregateValue::Empty;
    }

    let first_kind = column.kinds[0];
    if !column.kinds.iter().all(|k| *k == first_kind) {
        return AggregateValue::Mixed;
    }

    match first_kind {
        ScoreKind::Bool => {
            let passed = column.bool_passes.iter().filter(|p| **p).count();
            let pct = 100.0 * passed as f64 / column.bool_passes.len() as f64;
            AggregateValue::PassRate(pct)
        }
        ScoreKind::Num => {
            let mean = mean(&column.numbers);
            let n = column.numbers.len() as f64;
            let stderr = if n > 1.0 {
                std_deviation(&column.numbers) / n.sqrt()
            } else {
                0.0
            };
            AggregateValue::Numeric(EvaluatorStats { mean, stderr })
        }
        ScoreKind::Str => AggregateValue::StringLike,
        ScoreKind::Structured => AggregateValue::Structured,
    }
}
