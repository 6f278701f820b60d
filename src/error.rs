//! Typed errors at the library boundary (§7). Everything else (job/evaluator/
//! upload failures) is captured into the result tree rather than raised here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvaluatorqError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("failed to resolve dataset: {0}")]
    DataResolution(#[from] anyhow::Error),

    #[error("internal invariant violated: {0}")]
    Internal(String),

    #[error("failed to write results to disk: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize a result entry: {0}")]
    Serialization(#[from] serde_json::Error),
}
