//! Error types for the jobflow engine.
//!
//! The taxonomy separates author mistakes (configuration), caller
//! mistakes (validation), stage failures, hook failures, and scheduler
//! failures, so each surfaces at the right point of the lifecycle.

use thiserror::Error;

use crate::core::JobStatus;
use crate::lifecycle::HookEvent;

/// The main error type for jobflow operations.
#[derive(Debug, Error)]
pub enum JobflowError {
    /// The job type is misconfigured.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Required parameters were missing from a `perform` call.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A stage failed and no `on_error` hook was registered to handle it.
    #[error("{0}")]
    Stage(#[from] StageFailure),

    /// A lifecycle hook failed; hook errors are never swallowed.
    #[error("{0}")]
    Hook(#[from] HookError),

    /// The continuation scheduler refused or failed a handoff.
    #[error("{0}")]
    Scheduler(#[from] SchedulerError),

    /// `perform` was called on an instance in a terminal status.
    #[error("job is already {status}; no further stages may run")]
    Terminal {
        /// The terminal status the instance is in.
        status: JobStatus,
    },
}

/// Error raised when a job type's configuration cannot execute.
///
/// Configuration errors are fatal: they must be fixed by the job author
/// and are never retried.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    /// The job type declared no stages.
    #[error("no stages declared for job type '{job_type}'")]
    NoStages {
        /// The offending job type.
        job_type: String,
    },

    /// A stage name was requested that the job type never declared.
    #[error("job type '{job_type}' has no stage named '{stage}'")]
    UnknownStage {
        /// The job type consulted.
        job_type: String,
        /// The unknown stage name.
        stage: String,
    },

    /// `next_stage` was asked for the stage after the last one.
    #[error("no stage follows '{stage}' in job type '{job_type}'")]
    NoNextStage {
        /// The job type consulted.
        job_type: String,
        /// The stage with no successor.
        stage: String,
    },

    /// A continuation for one job type was delivered to an engine for
    /// another.
    #[error("continuation for job type '{found}' delivered to '{expected}'")]
    WrongJobType {
        /// The engine's job type.
        expected: String,
        /// The job type named in the continuation.
        found: String,
    },
}

/// Error raised when required parameters are missing.
///
/// Validation is a pure precondition: no hook fires and no status
/// transition occurs before it passes.
#[derive(Debug, Clone, Error)]
#[error("missing required params: {}", .missing.join(", "))]
pub struct ValidationError {
    /// The names of the missing parameters.
    pub missing: Vec<String>,
}

impl ValidationError {
    /// Creates a validation error naming the missing parameter keys.
    #[must_use]
    pub fn new(missing: Vec<String>) -> Self {
        Self { missing }
    }
}

/// A captured error from a stage's compute.
///
/// A stage failure always moves the job to `Failed` and always fires
/// `on_error` hooks; it propagates out of `perform` only when the job
/// type registered zero `on_error` hooks.
#[derive(Debug, Error)]
#[error("stage '{stage}' failed: {source}")]
pub struct StageFailure {
    stage: String,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl StageFailure {
    /// Captures a compute error for the named stage.
    #[must_use]
    pub fn new(stage: impl Into<String>, source: anyhow::Error) -> Self {
        Self {
            stage: stage.into(),
            source: source.into(),
        }
    }

    /// The stage that failed.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// The underlying error message.
    #[must_use]
    pub fn message(&self) -> String {
        self.source.to_string()
    }
}

/// An error raised inside a lifecycle hook.
///
/// Hook errors propagate from the point of dispatch and short-circuit
/// later hooks registered for the same event.
#[derive(Debug, Error)]
#[error("{event} hook failed: {source}")]
pub struct HookError {
    event: HookEvent,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl HookError {
    /// Wraps an error raised by a hook registered for `event`.
    #[must_use]
    pub fn new(event: HookEvent, source: anyhow::Error) -> Self {
        Self {
            event,
            source: source.into(),
        }
    }

    /// The event whose hook failed.
    #[must_use]
    pub fn event(&self) -> HookEvent {
        self.event
    }
}

/// Errors surfaced by a continuation scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The continuation queue is no longer accepting requests.
    #[error("continuation queue is closed")]
    QueueClosed,

    /// The scheduling backend failed.
    #[error("scheduling backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}
