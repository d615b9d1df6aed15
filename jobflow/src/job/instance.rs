//! Per-run job state.

use crate::core::{JobStatus, OutputMap, Params};
use crate::scheduler::ContinuationRequest;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The mutable state of one run of a job type.
///
/// An instance is created Pending with an empty output map and is
/// mutated exclusively by the execution engine. An instance resumed from
/// a continuation is a fresh object carrying the request's accumulated
/// output, params, and started flag; the flag travels in the request so
/// `before_start` is not re-derived from a freshly constructed object's
/// default status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobInstance {
    id: Uuid,
    status: JobStatus,
    current_stage: Option<String>,
    output: OutputMap,
    params: Params,
    started: bool,
}

impl JobInstance {
    /// Creates a fresh Pending instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            current_stage: None,
            output: OutputMap::new(),
            params: Params::new(),
            started: false,
        }
    }

    /// Reconstructs an instance from a delivered continuation.
    #[must_use]
    pub fn from_continuation(request: &ContinuationRequest) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            current_stage: None,
            output: request.output().clone(),
            params: request.params().clone(),
            started: request.started(),
        }
    }

    /// The instance's unique id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// The stage being or about to be executed.
    #[must_use]
    pub fn current_stage(&self) -> Option<&str> {
        self.current_stage.as_deref()
    }

    /// The accumulated per-stage outputs.
    #[must_use]
    pub fn output(&self) -> &OutputMap {
        &self.output
    }

    /// The caller-supplied parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// True once `before_start` has fired for this logical job.
    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }

    /// Returns true if no stage has run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Returns true if the job is underway.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Returns true if every stage completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    /// Returns true if a stage failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }

    pub(crate) fn set_status(&mut self, status: JobStatus) {
        self.status = status;
    }

    pub(crate) fn set_current_stage(&mut self, stage: &str) {
        self.current_stage = Some(stage.to_string());
    }

    pub(crate) fn set_params(&mut self, params: Params) {
        self.params = params;
    }

    pub(crate) fn record_output(&mut self, stage: &str, value: serde_json::Value) {
        self.output.record(stage, value);
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }
}

impl Default for JobInstance {
    fn default() -> Self {
        Self::new()
    }
}
