//! Declared job types and the declaration-time builder DSL.

use crate::core::Params;
use crate::lifecycle::{FnHook, Hook, HookContext, HookEvent, LifecycleRegistry};
use crate::stages::{FnStage, StageCompute, StageContext, StageRegistry, StageResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The delay between an asynchronous stage handoff and its resumption.
pub const DEFAULT_CONTINUATION_DELAY: Duration = Duration::from_secs(1);

/// The immutable configuration of one job type.
///
/// A job type is built once, at declaration time, and shared read-only
/// by every instance and engine that runs it. Deriving a new type copies
/// the configuration, so later mutation of the derived type never leaks
/// back into its parent.
#[derive(Clone)]
pub struct JobType {
    name: String,
    registry: StageRegistry,
    required_params: Vec<String>,
    asynchronous: bool,
    continuation_delay: Duration,
    lifecycle: LifecycleRegistry,
}

impl JobType {
    /// Starts a builder for a new job type.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> JobTypeBuilder {
        JobTypeBuilder::new(name)
    }

    /// The job type's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The ordered stage registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// The names of parameters every `perform` call must supply.
    #[must_use]
    pub fn required_params(&self) -> &[String] {
        &self.required_params
    }

    /// True if continuations hand off to the scheduler instead of
    /// running in the same call stack.
    #[must_use]
    pub fn asynchronous(&self) -> bool {
        self.asynchronous
    }

    /// The delay applied to scheduled continuations.
    #[must_use]
    pub fn continuation_delay(&self) -> Duration {
        self.continuation_delay
    }

    /// The lifecycle hook registry.
    #[must_use]
    pub fn lifecycle(&self) -> &LifecycleRegistry {
        &self.lifecycle
    }

    /// Computes which required parameters `params` is missing.
    #[must_use]
    pub fn missing_params(&self, params: &Params) -> Vec<String> {
        params.missing_of(&self.required_params)
    }

    /// Starts a builder for a subtype, copying this type's stages,
    /// required params, flags, and hooks.
    ///
    /// The copy is independent: declaring stages or hooks on the derived
    /// builder does not mutate this type.
    #[must_use]
    pub fn derive(&self, name: impl Into<String>) -> JobTypeBuilder {
        let name = name.into();
        JobTypeBuilder {
            registry: self.registry.clone().renamed(name.clone()),
            name,
            required_params: self.required_params.clone(),
            asynchronous: self.asynchronous,
            continuation_delay: self.continuation_delay,
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl fmt::Debug for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobType")
            .field("name", &self.name)
            .field("stages", &self.registry.len())
            .field("required_params", &self.required_params)
            .field("asynchronous", &self.asynchronous)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`JobType`].
///
/// Building with zero stages is allowed; the configuration error
/// surfaces at execution time, not build time.
pub struct JobTypeBuilder {
    name: String,
    registry: StageRegistry,
    required_params: Vec<String>,
    asynchronous: bool,
    continuation_delay: Duration,
    lifecycle: LifecycleRegistry,
}

impl JobTypeBuilder {
    /// Creates a builder for the named job type.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            registry: StageRegistry::new(name.clone()),
            name,
            required_params: Vec::new(),
            asynchronous: true,
            continuation_delay: DEFAULT_CONTINUATION_DELAY,
            lifecycle: LifecycleRegistry::new(),
        }
    }

    /// Declares a stage. Declaration order is execution order.
    #[must_use]
    pub fn stage(mut self, name: impl Into<String>, runner: Arc<dyn StageCompute>) -> Self {
        self.registry.declare(name, runner);
        self
    }

    /// Declares a stage backed by a plain closure.
    #[must_use]
    pub fn stage_fn<F>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&StageContext) -> StageResult + Send + Sync + 'static,
    {
        self.stage(name, Arc::new(FnStage::new(func)))
    }

    /// Sets the required parameter names, replacing any earlier set.
    #[must_use]
    pub fn required_params(mut self, names: &[&str]) -> Self {
        self.required_params = names.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Toggles the continuation policy. Defaults to asynchronous.
    #[must_use]
    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    /// Overrides the delay applied to scheduled continuations.
    #[must_use]
    pub fn continuation_delay(mut self, delay: Duration) -> Self {
        self.continuation_delay = delay;
        self
    }

    /// Registers a hook that fires once, before the first stage.
    #[must_use]
    pub fn before_start(mut self, hook: Arc<dyn Hook>) -> Self {
        self.lifecycle.register(HookEvent::BeforeStart, None, hook);
        self
    }

    /// Closure form of [`before_start`](Self::before_start).
    #[must_use]
    pub fn before_start_fn<F>(self, func: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_start(Arc::new(FnHook::new(func)))
    }

    /// Registers a hook that fires after the last stage completes.
    #[must_use]
    pub fn after_finish(mut self, hook: Arc<dyn Hook>) -> Self {
        self.lifecycle.register(HookEvent::AfterFinish, None, hook);
        self
    }

    /// Closure form of [`after_finish`](Self::after_finish).
    #[must_use]
    pub fn after_finish_fn<F>(self, func: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after_finish(Arc::new(FnHook::new(func)))
    }

    /// Registers a hook that fires before each stage, or before `stage`
    /// only when a filter is given.
    #[must_use]
    pub fn before_stage(mut self, stage: Option<&str>, hook: Arc<dyn Hook>) -> Self {
        self.lifecycle
            .register(HookEvent::BeforeStage, stage.map(String::from), hook);
        self
    }

    /// Closure form of [`before_stage`](Self::before_stage).
    #[must_use]
    pub fn before_stage_fn<F>(self, stage: Option<&str>, func: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.before_stage(stage, Arc::new(FnHook::new(func)))
    }

    /// Registers a hook that fires after each stage, or after `stage`
    /// only when a filter is given.
    #[must_use]
    pub fn after_stage(mut self, stage: Option<&str>, hook: Arc<dyn Hook>) -> Self {
        self.lifecycle
            .register(HookEvent::AfterStage, stage.map(String::from), hook);
        self
    }

    /// Closure form of [`after_stage`](Self::after_stage).
    #[must_use]
    pub fn after_stage_fn<F>(self, stage: Option<&str>, func: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.after_stage(stage, Arc::new(FnHook::new(func)))
    }

    /// Registers a hook that fires when a stage fails.
    ///
    /// Registering at least one error hook is how a job type opts into
    /// "errors are handled, do not propagate".
    #[must_use]
    pub fn on_error(mut self, hook: Arc<dyn Hook>) -> Self {
        self.lifecycle.register(HookEvent::OnError, None, hook);
        self
    }

    /// Closure form of [`on_error`](Self::on_error).
    #[must_use]
    pub fn on_error_fn<F>(self, func: F) -> Self
    where
        F: Fn(&HookContext<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_error(Arc::new(FnHook::new(func)))
    }

    /// Builds the job type.
    #[must_use]
    pub fn build(self) -> JobType {
        JobType {
            name: self.name,
            registry: self.registry,
            required_params: self.required_params,
            asynchronous: self.asynchronous,
            continuation_delay: self.continuation_delay,
            lifecycle: self.lifecycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::CollectingHook;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let job_type = JobType::builder("demo").build();

        assert_eq!(job_type.name(), "demo");
        assert!(job_type.asynchronous());
        assert_eq!(job_type.continuation_delay(), DEFAULT_CONTINUATION_DELAY);
        assert!(job_type.registry().is_empty());
        assert!(job_type.required_params().is_empty());
    }

    #[test]
    fn test_builder_declares_stages_in_order() {
        let job_type = JobType::builder("demo")
            .stage_fn("first", |_| Ok(json!(1)))
            .stage_fn("second", |_| Ok(json!(2)))
            .build();

        let names: Vec<&str> = job_type
            .registry()
            .stages()
            .iter()
            .map(crate::stages::StageDefinition::name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[test]
    fn test_builder_registers_hooks() {
        let job_type = JobType::builder("demo")
            .stage_fn("first", |_| Ok(json!(1)))
            .before_start_fn(|_| Ok(()))
            .before_stage_fn(Some("first"), |_| Ok(()))
            .after_stage_fn(None, |_| Ok(()))
            .after_stage_fn(None, |_| Ok(()))
            .on_error_fn(|_| Ok(()))
            .build();

        let lifecycle = job_type.lifecycle();
        assert_eq!(lifecycle.count(HookEvent::BeforeStart), 1);
        assert_eq!(lifecycle.count(HookEvent::BeforeStage), 1);
        assert_eq!(lifecycle.count(HookEvent::AfterStage), 2);
        assert_eq!(lifecycle.count(HookEvent::OnError), 1);
        assert_eq!(
            lifecycle.hooks_for(HookEvent::BeforeStage)[0].stage(),
            Some("first")
        );
    }

    #[test]
    fn test_required_params_replaces_earlier_set() {
        let job_type = JobType::builder("demo")
            .required_params(&["a"])
            .required_params(&["number", "exponent"])
            .build();

        assert_eq!(job_type.required_params(), ["number", "exponent"]);

        let params = Params::new().with("number", json!(2));
        assert_eq!(job_type.missing_params(&params), vec!["exponent"]);
    }

    #[test]
    fn test_derive_copies_configuration() {
        let parent = JobType::builder("parent")
            .stage_fn("first", |_| Ok(json!(1)))
            .required_params(&["x"])
            .asynchronous(false)
            .build();

        let child = parent
            .derive("child")
            .stage_fn("second", |_| Ok(json!(2)))
            .build();

        assert_eq!(child.name(), "child");
        assert_eq!(child.registry().job_type(), "child");
        assert_eq!(child.registry().len(), 2);
        assert!(!child.asynchronous());
        assert_eq!(child.required_params(), ["x"]);
    }

    #[test]
    fn test_derive_mutation_does_not_leak_to_parent() {
        let hook = std::sync::Arc::new(CollectingHook::new());
        let parent = JobType::builder("parent")
            .stage_fn("first", |_| Ok(json!(1)))
            .before_start(hook)
            .build();

        let _child = parent
            .derive("child")
            .stage_fn("second", |_| Ok(json!(2)))
            .before_start_fn(|_| Ok(()))
            .build();

        // The parent keeps its own stage list and hook list.
        assert_eq!(parent.registry().len(), 1);
        assert_eq!(parent.lifecycle().count(HookEvent::BeforeStart), 1);
        assert_eq!(parent.registry().job_type(), "parent");
    }
}
