//! Lifecycle hooks around stage boundaries.
//!
//! Hooks are ordered callbacks bound to one of five events, optionally
//! filtered to a single stage. They fire in registration order, and any
//! error they raise propagates to the engine instead of being swallowed.

mod registry;

pub use registry::{CollectingHook, HookRegistration, LifecycleRegistry};

use crate::errors::StageFailure;
use crate::job::JobInstance;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle events a hook can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    /// Fires once per logical job, before its first stage.
    BeforeStart,
    /// Fires before each stage's compute.
    BeforeStage,
    /// Fires after each stage's compute succeeds.
    AfterStage,
    /// Fires once, after the last stage completes.
    AfterFinish,
    /// Fires when a stage's compute fails.
    OnError,
}

impl HookEvent {
    /// Returns true for events that fire per stage and honor a stage
    /// filter.
    #[must_use]
    pub fn is_stage_scoped(&self) -> bool {
        matches!(self, Self::BeforeStage | Self::AfterStage)
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeStart => write!(f, "before_start"),
            Self::BeforeStage => write!(f, "before_stage"),
            Self::AfterStage => write!(f, "after_stage"),
            Self::AfterFinish => write!(f, "after_finish"),
            Self::OnError => write!(f, "on_error"),
        }
    }
}

/// What a hook sees when it fires.
///
/// The job view is read-only; hooks observe but never mutate instance
/// state. The failure is present only for [`HookEvent::OnError`].
pub struct HookContext<'a> {
    event: HookEvent,
    job: &'a JobInstance,
    error: Option<&'a StageFailure>,
}

impl<'a> HookContext<'a> {
    /// Creates a hook context.
    #[must_use]
    pub fn new(event: HookEvent, job: &'a JobInstance, error: Option<&'a StageFailure>) -> Self {
        Self { event, job, error }
    }

    /// The event being dispatched.
    #[must_use]
    pub fn event(&self) -> HookEvent {
        self.event
    }

    /// The job instance the event fired on.
    #[must_use]
    pub fn job(&self) -> &JobInstance {
        self.job
    }

    /// The stage the job is currently on.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        self.job.current_stage()
    }

    /// The captured failure, for `on_error` dispatches.
    #[must_use]
    pub fn error(&self) -> Option<&StageFailure> {
        self.error
    }
}

impl fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("event", &self.event)
            .field("stage", &self.stage())
            .finish_non_exhaustive()
    }
}

/// Trait for lifecycle hooks.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Invokes the hook.
    async fn call(&self, ctx: &HookContext<'_>) -> anyhow::Result<()>;
}

/// A simple function-based hook.
pub struct FnHook<F>
where
    F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    func: F,
}

impl<F> FnHook<F>
where
    F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    /// Creates a new function-based hook.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> fmt::Debug for FnHook<F>
where
    F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHook").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync,
{
    async fn call(&self, ctx: &HookContext<'_>) -> anyhow::Result<()> {
        (self.func)(ctx)
    }
}
