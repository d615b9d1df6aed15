//! Per-job-type ordered stage registry.

use super::{StageCompute, StageContext, StageResult};
use crate::errors::ConfigurationError;
use std::fmt;
use std::sync::Arc;

/// One declared stage: a name bound to a computation.
///
/// Definitions are owned by the job type's registry and immutable after
/// declaration.
#[derive(Clone)]
pub struct StageDefinition {
    name: String,
    runner: Arc<dyn StageCompute>,
}

impl StageDefinition {
    /// Creates a new stage definition.
    #[must_use]
    pub fn new(name: impl Into<String>, runner: Arc<dyn StageCompute>) -> Self {
        Self {
            name: name.into(),
            runner,
        }
    }

    /// The stage's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the stage's computation.
    pub async fn run(&self, ctx: &StageContext) -> StageResult {
        self.runner.compute(ctx).await
    }
}

impl fmt::Debug for StageDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The ordered stage list of one job type.
///
/// Insertion order is execution order. Name uniqueness is not enforced:
/// a duplicate declaration keeps both order entries, and name lookup
/// resolves to the latest registration.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    job_type: String,
    stages: Vec<StageDefinition>,
}

impl StageRegistry {
    /// Creates an empty registry for the named job type.
    #[must_use]
    pub fn new(job_type: impl Into<String>) -> Self {
        Self {
            job_type: job_type.into(),
            stages: Vec::new(),
        }
    }

    /// The owning job type's name.
    #[must_use]
    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// Appends a stage declaration.
    pub fn declare(&mut self, name: impl Into<String>, runner: Arc<dyn StageCompute>) {
        self.stages.push(StageDefinition::new(name, runner));
    }

    /// Returns the ordered stage sequence.
    #[must_use]
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    /// Returns the first declared stage.
    #[must_use]
    pub fn first(&self) -> Option<&StageDefinition> {
        self.stages.first()
    }

    /// Returns the latest definition declared under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().rev().find(|s| s.name() == name)
    }

    /// Returns true iff `name` equals the last declared stage.
    #[must_use]
    pub fn is_last_stage(&self, name: &str) -> bool {
        self.stages.last().is_some_and(|s| s.name() == name)
    }

    /// Returns the stage following the first occurrence of `current`.
    ///
    /// Callers are expected to check `is_last_stage` first.
    pub fn next_stage(&self, current: &str) -> Result<&StageDefinition, ConfigurationError> {
        let index = self
            .stages
            .iter()
            .position(|s| s.name() == current)
            .ok_or_else(|| ConfigurationError::UnknownStage {
                job_type: self.job_type.clone(),
                stage: current.to_string(),
            })?;

        self.stages
            .get(index + 1)
            .ok_or_else(|| ConfigurationError::NoNextStage {
                job_type: self.job_type.clone(),
                stage: current.to_string(),
            })
    }

    /// Returns the number of declared stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if no stage has been declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub(crate) fn renamed(mut self, job_type: impl Into<String>) -> Self {
        self.job_type = job_type.into();
        self
    }
}
