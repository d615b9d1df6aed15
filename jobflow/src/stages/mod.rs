//! Stage trait and implementations.
//!
//! Stages are the ordered units of work in a jobflow job type.

mod registry;

pub use registry::{StageDefinition, StageRegistry};

use crate::core::{OutputMap, Params};
use async_trait::async_trait;
use std::fmt::Debug;

/// The result of a stage computation.
pub type StageResult = anyhow::Result<serde_json::Value>;

/// The inputs visible to one stage execution.
///
/// The context is a snapshot: it carries the caller's parameter bag and
/// the outputs of every stage that completed before this one.
#[derive(Debug, Clone)]
pub struct StageContext {
    stage: String,
    params: Params,
    output: OutputMap,
}

impl StageContext {
    /// Creates a context for one execution of `stage`.
    #[must_use]
    pub fn new(stage: impl Into<String>, params: Params, output: OutputMap) -> Self {
        Self {
            stage: stage.into(),
            params,
            output,
        }
    }

    /// The stage being executed.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// The caller-supplied parameter bag.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The outputs of prior stages.
    #[must_use]
    pub fn output(&self) -> &OutputMap {
        &self.output
    }

    /// Gets one parameter value.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&serde_json::Value> {
        self.params.get(key)
    }

    /// Gets one prior stage's result.
    #[must_use]
    pub fn prior(&self, stage: &str) -> Option<&serde_json::Value> {
        self.output.get(stage)
    }
}

/// Trait for stage computations.
///
/// A stage receives a context snapshot and returns a result value that
/// the engine records under the stage's name, or an error that fails the
/// job.
#[async_trait]
pub trait StageCompute: Send + Sync {
    /// Executes the stage.
    async fn compute(&self, ctx: &StageContext) -> StageResult;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> StageCompute for FnStage<F>
where
    F: Fn(&StageContext) -> StageResult + Send + Sync,
{
    async fn compute(&self, ctx: &StageContext) -> StageResult {
        (self.func)(ctx)
    }
}

/// An async function-based stage.
///
/// The closure receives an owned context so its future does not borrow
/// from the engine.
pub struct AsyncFnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = StageResult> + Send,
{
    func: F,
    _phantom: std::marker::PhantomData<fn() -> Fut>,
}

impl<F, Fut> AsyncFnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = StageResult> + Send,
{
    /// Creates a new async function-based stage.
    pub fn new(func: F) -> Self {
        Self {
            func,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<F, Fut> Debug for AsyncFnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = StageResult> + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut> StageCompute for AsyncFnStage<F, Fut>
where
    F: Fn(StageContext) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = StageResult> + Send,
{
    async fn compute(&self, ctx: &StageContext) -> StageResult {
        (self.func)(ctx.clone()).await
    }
}

/// A stage that does nothing, for testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpStage;

impl NoOpStage {
    /// Creates a new no-op stage.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StageCompute for NoOpStage {
    async fn compute(&self, _ctx: &StageContext) -> StageResult {
        Ok(serde_json::Value::Null)
    }
}
