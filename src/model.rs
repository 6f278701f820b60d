//! Canonical in-memory result tree (§3) and the value types that flow
//! through normalization, aggregation, and upload serialization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One input row under test.
///
/// Immutable once produced by the [`crate::data::DataResolver`]. `inputs` and
/// `expected_output` are the fields evaluators are expected to look at;
/// `extra` preserves any opaque pass-through fields verbatim so a remote
/// dataset record round-trips through the harness without losing data the
/// core doesn't understand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Datapoint {
    pub inputs: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Value>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl Datapoint {
    pub fn new(inputs: HashMap<String, Value>) -> Self {
        Self {
            inputs,
            expected_output: None,
            messages: None,
            extra: HashMap::new(),
        }
    }
}

/// A tagged multi-metric score, e.g. `{ type: "similarity", value: { cosine: 0.92 } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationResultCell {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: HashMap<String, f64>,
}

/// The normalized shape of whatever an evaluator's raw return value turns into
/// (§4.5, the Score Normalizer's single choke point).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScoreValue {
    Bool(bool),
    Num(f64),
    Str(String),
    Cell(EvaluationResultCell),
    Raw(Value),
}

impl ScoreValue {
    /// Used by the aggregator to classify a run of scores before reducing them.
    pub fn kind(&self) -> ScoreKind {
        match self {
            ScoreValue::Bool(_) => ScoreKind::Bool,
            ScoreValue::Num(_) => ScoreKind::Num,
            ScoreValue::Str(_) => ScoreKind::Str,
            ScoreValue::Cell(_) => ScoreKind::Structured,
            ScoreValue::Raw(_) => ScoreKind::Structured,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    Bool,
    Num,
    Str,
    Structured,
}

/// The normalized result of one evaluator run: a value plus optional
/// pass/fail and explanation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Score {
    pub value: ScoreValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Score {
    pub fn new(value: ScoreValue) -> Self {
        Self {
            value,
            pass: None,
            explanation: None,
        }
    }

    pub fn with_pass(mut self, pass: bool) -> Self {
        self.pass = Some(pass);
        self
    }
}

/// `{ evaluatorName, score, error? }` (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluatorScore {
    pub evaluator_name: String,
    pub score: Score,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluatorScore {
    /// Synthesized entry for a job that errored, or an evaluator that threw (§4.4, §4.5).
    pub fn failed(evaluator_name: impl Into<String>, explanation: &str, error: String) -> Self {
        Self {
            evaluator_name: evaluator_name.into(),
            score: Score {
                value: ScoreValue::Num(0.0),
                pass: Some(false),
                explanation: Some(explanation.to_string()),
            },
            error: Some(error),
        }
    }
}

/// `{ jobName, output | null, error?, evaluatorScores }` (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobResult {
    pub job_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub evaluator_scores: Vec<EvaluatorScore>,
}

/// One entry of the result tree: a datapoint plus the results of every job run against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluatorqEntry {
    pub data_point: Datapoint,
    pub job_results: Vec<JobResult>,
}

/// The full canonical result tree (§3), in input order (I1).
pub type EvaluatorqResult = Vec<EvaluatorqEntry>;

/// Whether the run as a whole passed: no evaluator score with an explicit `pass == false` (I6).
pub fn run_passed(results: &EvaluatorqResult) -> bool {
    !results.iter().any(|entry| {
        entry.job_results.iter().any(|job_result| {
            job_result
                .evaluator_scores
                .iter()
                .any(|es| es.score.pass == Some(false))
        })
    })
}
