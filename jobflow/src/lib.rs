//! # Jobflow
//!
//! A staged job execution engine.
//!
//! Jobflow lets a long-running unit of work be declared as an ordered
//! sequence of named **stages**, each a computation over the caller's
//! parameters and the outputs of prior stages, executed one at a time
//! with support for:
//!
//! - **Staged execution**: stages run strictly in declaration order
//! - **Lifecycle hooks**: ordered callbacks around start, stage, finish,
//!   and error boundaries, optionally filtered to a single stage
//! - **Suspend and resume**: between stages a job can hand itself off to
//!   an external scheduler and resume later, possibly in another process
//! - **Explicit error contract**: a failed stage moves the job to
//!   `Failed`, fires `on_error` hooks, and escalates to the caller only
//!   when no error hook was registered
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobflow::prelude::*;
//!
//! // Declare a job type
//! let job_type = Arc::new(
//!     JobType::builder("power")
//!         .required_params(&["number", "exponent"])
//!         .stage_fn("calc", |ctx| {
//!             let n = ctx.param("number").and_then(|v| v.as_i64()).unwrap_or(0);
//!             let e = ctx.param("exponent").and_then(|v| v.as_u64()).unwrap_or(0);
//!             Ok(serde_json::json!(n.pow(e as u32)))
//!         })
//!         .stage_fn("hexify", |ctx| {
//!             let n = ctx.prior("calc").and_then(|v| v.as_i64()).unwrap_or(0);
//!             Ok(serde_json::json!(format!("{n:x}")))
//!         })
//!         .asynchronous(false)
//!         .build(),
//! );
//!
//! // Run it
//! let engine = ExecutionEngine::new(job_type, Arc::new(RecordingScheduler::new()));
//! let params = Params::new()
//!     .with("number", serde_json::json!(2))
//!     .with("exponent", serde_json::json!(3));
//! let (job, outcome) = engine.start(params).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod engine;
pub mod errors;
pub mod job;
pub mod lifecycle;
pub mod observability;
pub mod scheduler;
pub mod stages;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{JobStatus, OutputMap, Params};
    pub use crate::engine::{ExecutionEngine, Outcome};
    pub use crate::errors::{
        ConfigurationError, HookError, JobflowError, SchedulerError, StageFailure,
        ValidationError,
    };
    pub use crate::job::{JobInstance, JobType, JobTypeBuilder};
    pub use crate::lifecycle::{
        CollectingHook, FnHook, Hook, HookContext, HookEvent, HookRegistration,
        LifecycleRegistry,
    };
    pub use crate::observability::{init_tracing, StageTimer};
    pub use crate::scheduler::{
        ChannelScheduler, ContinuationHandle, ContinuationRequest, ContinuationScheduler,
        RecordingScheduler,
    };
    pub use crate::stages::{
        AsyncFnStage, FnStage, NoOpStage, StageCompute, StageContext, StageDefinition,
        StageRegistry, StageResult,
    };
}
