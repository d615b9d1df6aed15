//! The staged execution engine.
//!
//! [`ExecutionEngine::perform`] runs one job instance through its
//! stages: it validates preconditions, dispatches lifecycle hooks around
//! each stage boundary, records stage outputs, and decides whether to
//! keep going in the same call stack or hand the rest of the job to the
//! continuation scheduler.

#[cfg(test)]
mod integration_tests;

use crate::core::{JobStatus, Params};
use crate::errors::{ConfigurationError, HookError, JobflowError, StageFailure, ValidationError};
use crate::job::{JobInstance, JobType};
use crate::lifecycle::HookEvent;
use crate::observability::StageTimer;
use crate::scheduler::{ContinuationHandle, ContinuationRequest, ContinuationScheduler};
use crate::stages::StageContext;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How one `perform` invocation ended.
///
/// A handled failure is an `Ok(Outcome::Failed)` return, not an error:
/// registering at least one `on_error` hook is how a job type opts into
/// handling. Unhandled failures come back as `Err`.
#[derive(Debug)]
pub enum Outcome {
    /// The last stage completed; the job is Finished.
    Finished,
    /// A continuation for `next_stage` was handed to the scheduler.
    Suspended {
        /// The stage the continuation will resume at.
        next_stage: String,
        /// The scheduler's receipt.
        handle: ContinuationHandle,
    },
    /// A stage failed and the job type's `on_error` hooks handled it.
    Failed(StageFailure),
}

impl Outcome {
    /// Returns true if the job ran to completion.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// Returns true if the job was handed off to the scheduler.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }

    /// Returns true if a stage failed (handled).
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// The state machine that drives job instances through their stages.
pub struct ExecutionEngine {
    job_type: Arc<JobType>,
    scheduler: Arc<dyn ContinuationScheduler>,
}

impl ExecutionEngine {
    /// Creates an engine for one job type.
    #[must_use]
    pub fn new(job_type: Arc<JobType>, scheduler: Arc<dyn ContinuationScheduler>) -> Self {
        Self {
            job_type,
            scheduler,
        }
    }

    /// The job type this engine runs.
    #[must_use]
    pub fn job_type(&self) -> &JobType {
        &self.job_type
    }

    /// Creates a fresh instance and performs it from the first stage.
    pub async fn start(&self, params: Params) -> Result<(JobInstance, Outcome), JobflowError> {
        let mut job = JobInstance::new();
        let outcome = self.perform(&mut job, None, params).await?;
        Ok((job, outcome))
    }

    /// Resumes a delivered continuation on a freshly constructed
    /// instance.
    ///
    /// The request's started flag travels with it, so `before_start`
    /// does not re-fire on resumption.
    pub async fn resume(
        &self,
        request: ContinuationRequest,
    ) -> Result<(JobInstance, Outcome), JobflowError> {
        if request.job_type() != self.job_type.name() {
            return Err(ConfigurationError::WrongJobType {
                expected: self.job_type.name().to_string(),
                found: request.job_type().to_string(),
            }
            .into());
        }

        let mut job = JobInstance::from_continuation(&request);
        let stage = request.stage().to_string();
        let params = request.params().clone();
        let outcome = self.perform(&mut job, Some(&stage), params).await?;
        Ok((job, outcome))
    }

    /// Runs `job` starting at `stage` (the first declared stage when
    /// absent) with the supplied parameters.
    ///
    /// Synchronous job types run every remaining stage before returning;
    /// asynchronous types run exactly one stage and hand the next to the
    /// scheduler.
    pub async fn perform(
        &self,
        job: &mut JobInstance,
        stage: Option<&str>,
        params: Params,
    ) -> Result<Outcome, JobflowError> {
        let registry = self.job_type.registry();

        // Preconditions, before any side effect: no hook fires and no
        // status transition happens unless all three pass.
        if registry.is_empty() {
            return Err(ConfigurationError::NoStages {
                job_type: self.job_type.name().to_string(),
            }
            .into());
        }

        let missing = self.job_type.missing_params(&params);
        if !missing.is_empty() {
            return Err(ValidationError::new(missing).into());
        }

        if job.status().is_terminal() {
            return Err(JobflowError::Terminal {
                status: job.status(),
            });
        }

        let mut target = match stage {
            Some(name) => registry
                .get(name)
                .ok_or_else(|| ConfigurationError::UnknownStage {
                    job_type: self.job_type.name().to_string(),
                    stage: name.to_string(),
                })?
                .name()
                .to_string(),
            None => registry
                .first()
                .ok_or_else(|| ConfigurationError::NoStages {
                    job_type: self.job_type.name().to_string(),
                })?
                .name()
                .to_string(),
        };

        job.set_params(params);

        loop {
            job.set_current_stage(&target);

            if !job.started() {
                self.dispatch(HookEvent::BeforeStart, job, None).await?;
                job.mark_started();
            }
            job.set_status(JobStatus::Running);

            self.dispatch(HookEvent::BeforeStage, job, None).await?;

            if let Some(failure) = self.run_stage(job, &target).await? {
                return Ok(Outcome::Failed(failure));
            }

            self.dispatch(HookEvent::AfterStage, job, None).await?;

            if registry.is_last_stage(&target) {
                job.set_status(JobStatus::Finished);
                self.dispatch(HookEvent::AfterFinish, job, None).await?;
                info!(
                    job_type = %self.job_type.name(),
                    job_id = %job.id(),
                    "job finished"
                );
                return Ok(Outcome::Finished);
            }

            let next = registry.next_stage(&target)?.name().to_string();

            if self.job_type.asynchronous() {
                let request = ContinuationRequest::new(
                    self.job_type.name(),
                    &next,
                    job.params().clone(),
                    job.output().clone(),
                );
                let delay = self.job_type.continuation_delay();
                let handle = self.scheduler.schedule_after(delay, request).await?;
                info!(
                    job_type = %self.job_type.name(),
                    job_id = %job.id(),
                    next_stage = %next,
                    "continuation scheduled"
                );
                return Ok(Outcome::Suspended {
                    next_stage: next,
                    handle,
                });
            }

            // Synchronous continuation: the next stage runs in the same
            // call stack.
            target = next;
        }
    }

    /// Runs one stage's compute under the failure-capture contract.
    ///
    /// Returns `Ok(Some(failure))` for a handled failure,
    /// `Err(JobflowError::Stage)` for an unhandled one.
    async fn run_stage(
        &self,
        job: &mut JobInstance,
        target: &str,
    ) -> Result<Option<StageFailure>, JobflowError> {
        let definition = self.job_type.registry().get(target).ok_or_else(|| {
            ConfigurationError::UnknownStage {
                job_type: self.job_type.name().to_string(),
                stage: target.to_string(),
            }
        })?;

        let timer = StageTimer::start(target);
        let ctx = StageContext::new(target, job.params().clone(), job.output().clone());

        match definition.run(&ctx).await {
            Ok(value) => {
                debug!(
                    job_type = %self.job_type.name(),
                    stage = %target,
                    duration_ms = timer.finish(),
                    "stage completed"
                );
                job.record_output(target, value);
                Ok(None)
            }
            Err(source) => {
                job.set_status(JobStatus::Failed);
                let failure = StageFailure::new(target, source);
                warn!(
                    job_type = %self.job_type.name(),
                    stage = %target,
                    error = %failure,
                    "stage failed"
                );

                self.dispatch(HookEvent::OnError, job, Some(&failure))
                    .await?;

                if self.job_type.lifecycle().has_hooks(HookEvent::OnError) {
                    Ok(Some(failure))
                } else {
                    Err(failure.into())
                }
            }
        }
    }

    async fn dispatch(
        &self,
        event: HookEvent,
        job: &JobInstance,
        error: Option<&StageFailure>,
    ) -> Result<(), HookError> {
        self.job_type.lifecycle().dispatch(event, job, error).await
    }
}
