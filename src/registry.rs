//! Job Registry (§4.2) and Evaluator Registry (§4.3).
//!
//! Both registries are the same shape: an ordered list of named async
//! callbacks. We model "async callback that may fail" as a boxed
//! `async_trait` object rather than a bare `Fn` pointer, since jobs and
//! evaluators routinely need to capture state (an HTTP client, a closure
//! over a provider adapter) and run arbitrary async code.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::model::Datapoint;

/// Code under test: `(datapoint, row_index) -> Output` (§3).
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self, datapoint: &Datapoint, row_index: usize) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> Job for F
where
    F: Fn(&Datapoint, usize) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send,
{
    async fn run(&self, datapoint: &Datapoint, row_index: usize) -> anyhow::Result<Value> {
        self(datapoint, row_index).await
    }
}

/// A scorer: `{ data, output } -> ScoreResult` (§3). The raw JSON return value
/// is handed to [`crate::normalize::normalize_score`] by the executor; the
/// evaluator itself never sees another evaluator's score (§4.3).
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn run(&self, datapoint: &Datapoint, output: &Value) -> anyhow::Result<Value>;
}

#[async_trait]
impl<F, Fut> Evaluator for F
where
    F: Fn(&Datapoint, &Value) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Value>> + Send,
{
    async fn run(&self, datapoint: &Datapoint, output: &Value) -> anyhow::Result<Value> {
        self(datapoint, output).await
    }
}

/// A named entry in either registry.
pub struct Named<T: ?Sized> {
    pub name: String,
    pub handler: Arc<T>,
}

/// Ordered, registration-preserving list of named jobs or evaluators (§4.2, §4.3).
///
/// Name collisions are allowed (I2/I3 only constrain length and order, never
/// uniqueness); the presenter disambiguates by position. Anonymous job
/// functions are accepted and assigned synthesized names (`job_<index>`) via
/// [`Registry::push_anonymous`].
pub struct Registry<T: ?Sized> {
    entries: Vec<Named<T>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, handler: Arc<T>) -> &mut Self {
        self.entries.push(Named {
            name: name.into(),
            handler,
        });
        self
    }

    /// Registers `handler` with a synthesized `job_<index>` / `eval_<index>`
    /// style name, for callers that don't have a natural name to give it.
    pub fn push_anonymous(&mut self, prefix: &str, handler: Arc<T>) -> &mut Self {
        let name = format!("{prefix}_{}", self.entries.len());
        self.push(name, handler)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Named<T>> {
        self.entries.iter()
    }
}

pub type JobRegistry = Registry<dyn Job>;
pub type EvaluatorRegistry = Registry<dyn Evaluator>;
