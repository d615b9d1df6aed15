//! Ordered hook registrations per event.

use super::{Hook, HookContext, HookEvent};
use crate::errors::{HookError, StageFailure};
use crate::job::JobInstance;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One registered hook: an optional stage filter plus the hook value.
///
/// A non-empty filter restricts the registration to dispatches whose
/// current stage matches; an absent filter applies to every stage.
#[derive(Clone)]
pub struct HookRegistration {
    stage: Option<String>,
    hook: Arc<dyn Hook>,
}

impl HookRegistration {
    /// Creates a registration.
    #[must_use]
    pub fn new(stage: Option<String>, hook: Arc<dyn Hook>) -> Self {
        Self { stage, hook }
    }

    /// The stage filter, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }
}

impl fmt::Debug for HookRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistration")
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

/// Per-job-type hook registrations, keyed by event.
///
/// Registrations for one event fire in insertion order; that ordering is
/// part of the observable contract.
#[derive(Clone, Default)]
pub struct LifecycleRegistry {
    hooks: HashMap<HookEvent, Vec<HookRegistration>>,
}

impl LifecycleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a registration to the event's ordered list.
    pub fn register(&mut self, event: HookEvent, stage: Option<String>, hook: Arc<dyn Hook>) {
        self.hooks
            .entry(event)
            .or_default()
            .push(HookRegistration::new(stage, hook));
    }

    /// Returns the event's registrations in insertion order.
    #[must_use]
    pub fn hooks_for(&self, event: HookEvent) -> &[HookRegistration] {
        self.hooks.get(&event).map_or(&[], Vec::as_slice)
    }

    /// Returns the number of registrations for `event`.
    #[must_use]
    pub fn count(&self, event: HookEvent) -> usize {
        self.hooks_for(event).len()
    }

    /// Returns true if any hook is registered for `event`.
    #[must_use]
    pub fn has_hooks(&self, event: HookEvent) -> bool {
        !self.hooks_for(event).is_empty()
    }

    /// Dispatches `event` to every matching registration, in order.
    ///
    /// A registration with a stage filter is skipped unless the filter
    /// equals the job's current stage. Hook errors are not caught here;
    /// the first failure stops dispatch and surfaces to the caller.
    pub async fn dispatch(
        &self,
        event: HookEvent,
        job: &JobInstance,
        error: Option<&StageFailure>,
    ) -> Result<(), HookError> {
        for registration in self.hooks_for(event) {
            if let Some(filter) = registration.stage() {
                if job.current_stage() != Some(filter) {
                    continue;
                }
            }

            let ctx = HookContext::new(event, job, error);
            registration
                .hook
                .call(&ctx)
                .await
                .map_err(|source| HookError::new(event, source))?;
        }

        Ok(())
    }
}

impl fmt::Debug for LifecycleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<HookEvent, usize> =
            self.hooks.iter().map(|(e, v)| (*e, v.len())).collect();
        f.debug_struct("LifecycleRegistry")
            .field("counts", &counts)
            .finish()
    }
}

/// A hook that records every firing, for tests.
#[derive(Debug, Default)]
pub struct CollectingHook {
    seen: parking_lot::Mutex<Vec<(HookEvent, Option<String>)>>,
}

impl CollectingHook {
    /// Creates a new collecting hook.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every `(event, stage)` pair seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<(HookEvent, Option<String>)> {
        self.seen.lock().clone()
    }

    /// Returns how many times `event` fired.
    #[must_use]
    pub fn count_of(&self, event: HookEvent) -> usize {
        self.seen.lock().iter().filter(|(e, _)| *e == event).count()
    }

    /// Returns the total number of firings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Returns true if the hook never fired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    /// Clears the recorded firings.
    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

#[async_trait]
impl Hook for CollectingHook {
    async fn call(&self, ctx: &HookContext<'_>) -> anyhow::Result<()> {
        self.seen
            .lock()
            .push((ctx.event(), ctx.stage().map(String::from)));
        Ok(())
    }
}
