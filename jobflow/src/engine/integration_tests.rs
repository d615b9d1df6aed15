//! End-to-end engine scenarios: hook ordering, failure handling, and
//! continuation round-trips.

use super::*;
use crate::core::OutputMap;
use crate::lifecycle::CollectingHook;
use crate::scheduler::{ChannelScheduler, RecordingScheduler};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

/// Records labeled firings so ordering across different hooks is
/// observable.
fn seq_hook(
    label: &'static str,
    log: &Arc<Mutex<Vec<&'static str>>>,
) -> Arc<dyn crate::lifecycle::Hook> {
    let log = log.clone();
    Arc::new(crate::lifecycle::FnHook::new(move |_ctx| {
        log.lock().push(label);
        Ok(())
    }))
}

fn power_job_type() -> JobType {
    JobType::builder("power")
        .required_params(&["number", "exponent"])
        .stage_fn("calc", |ctx| {
            let number = ctx
                .param("number")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| anyhow::anyhow!("number must be an integer"))?;
            let exponent = ctx
                .param("exponent")
                .and_then(serde_json::Value::as_u64)
                .ok_or_else(|| anyhow::anyhow!("exponent must be a non-negative integer"))?;
            Ok(json!(number.pow(u32::try_from(exponent)?)))
        })
        .stage_fn("hexify", |ctx| {
            let calc = ctx
                .prior("calc")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| anyhow::anyhow!("calc output missing"))?;
            Ok(json!(format!("{calc:x}")))
        })
        .build()
}

fn power_params() -> Params {
    Params::new()
        .with("number", json!(2))
        .with("exponent", json!(3))
}

#[tokio::test]
async fn test_synchronous_three_stage_job_runs_to_completion() {
    let job_type = JobType::builder("sync-demo")
        .asynchronous(false)
        .stage_fn("first", |_| Ok(json!(42)))
        .stage_fn("second", |ctx| {
            let first = ctx.prior("first").and_then(serde_json::Value::as_i64).unwrap_or(0);
            Ok(json!(first + 1))
        })
        .stage_fn("third", |ctx| {
            let second = ctx.prior("second").and_then(serde_json::Value::as_i64).unwrap_or(0);
            Ok(json!(second * 2))
        })
        .build();

    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = ExecutionEngine::new(Arc::new(job_type), scheduler.clone());

    let (job, outcome) = engine.start(Params::new()).await.unwrap();

    assert!(outcome.is_finished());
    assert!(job.is_finished());
    assert_eq!(job.output().get("first"), Some(&json!(42)));
    assert_eq!(job.output().get("second"), Some(&json!(43)));
    assert_eq!(job.output().get("third"), Some(&json!(86)));
    // The synchronous path never touches the scheduler.
    assert!(scheduler.is_empty());
}

#[tokio::test]
async fn test_async_continuation_carries_params_and_output() {
    let job_type = JobType::builder("carry")
        .required_params(&["x"])
        .stage_fn("a", |_| Ok(json!("from a")))
        .stage_fn("b", |_| Ok(json!("from b")))
        .build();

    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = ExecutionEngine::new(Arc::new(job_type), scheduler.clone());

    let params = Params::new().with("x", json!(1));
    let (_, outcome) = engine.start(params).await.unwrap();
    assert!(outcome.is_suspended());

    let (delay, request) = scheduler.scheduled().pop().unwrap();
    assert_eq!(delay, Duration::from_secs(1));
    assert_eq!(request.job_type(), "carry");
    assert_eq!(request.stage(), "b");
    assert_eq!(request.params().get("x"), Some(&json!(1)));
    assert_eq!(request.output().get("a"), Some(&json!("from a")));
    assert!(!request.output().contains("b"));
    assert!(request.started());
}

#[tokio::test]
async fn test_power_job_end_to_end_across_continuation() {
    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = ExecutionEngine::new(Arc::new(power_job_type()), scheduler.clone());

    let (job, outcome) = engine.start(power_params()).await.unwrap();
    assert!(outcome.is_suspended());
    assert_eq!(job.output().get("calc"), Some(&json!(8)));

    let request = scheduler.last_scheduled().unwrap();
    let (resumed, outcome) = engine.resume(request).await.unwrap();

    assert!(outcome.is_finished());
    assert!(resumed.is_finished());
    assert_eq!(resumed.output().get("calc"), Some(&json!(8)));
    assert_eq!(resumed.output().get("hexify"), Some(&json!("8")));
}

#[tokio::test]
async fn test_worker_loop_drains_channel_scheduler_to_completion() {
    let (scheduler, mut rx) = ChannelScheduler::new();
    let job_type = power_job_type()
        .derive("power-queued")
        .continuation_delay(Duration::from_millis(5))
        .build();
    let engine = ExecutionEngine::new(Arc::new(job_type), Arc::new(scheduler));

    let (_, outcome) = engine.start(power_params()).await.unwrap();
    assert!(outcome.is_suspended());

    // Drain the queue the way a worker would, resuming each delivered
    // continuation until the job stops suspending.
    let mut last = None;
    while let Some(request) = rx.recv().await {
        let (job, outcome) = engine.resume(request).await.unwrap();
        let done = !outcome.is_suspended();
        last = Some((job, outcome));
        if done {
            break;
        }
    }

    let (job, outcome) = last.unwrap();
    assert!(outcome.is_finished());
    assert_eq!(job.output().get("hexify"), Some(&json!("8")));
}

#[tokio::test]
async fn test_before_start_fires_once_and_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let job_type = JobType::builder("hooked")
        .asynchronous(false)
        .stage_fn("first", |_| Ok(json!(1)))
        .stage_fn("second", |_| Ok(json!(2)))
        .before_start(seq_hook("before_start", &log))
        .before_stage(None, seq_hook("before_stage", &log))
        .after_stage(None, seq_hook("after_stage", &log))
        .after_finish(seq_hook("after_finish", &log))
        .build();

    let engine = ExecutionEngine::new(Arc::new(job_type), Arc::new(RecordingScheduler::new()));
    let (_, outcome) = engine.start(Params::new()).await.unwrap();

    assert!(outcome.is_finished());
    assert_eq!(
        *log.lock(),
        vec![
            "before_start",
            "before_stage",
            "after_stage",
            "before_stage",
            "after_stage",
            "after_finish",
        ]
    );
}

#[tokio::test]
async fn test_before_start_does_not_refire_on_resume() {
    let hook = Arc::new(CollectingHook::new());
    let job_type = JobType::builder("resumable")
        .stage_fn("a", |_| Ok(json!(1)))
        .stage_fn("b", |_| Ok(json!(2)))
        .before_start(hook.clone())
        .build();

    let scheduler = Arc::new(RecordingScheduler::new());
    let engine = ExecutionEngine::new(Arc::new(job_type), scheduler.clone());

    engine.start(Params::new()).await.unwrap();
    assert_eq!(hook.count_of(HookEvent::BeforeStart), 1);

    let request = scheduler.last_scheduled().unwrap();
    let (job, outcome) = engine.resume(request).await.unwrap();

    assert!(outcome.is_finished());
    assert!(job.is_finished());
    // Still exactly one firing for the logical job.
    assert_eq!(hook.count_of(HookEvent::BeforeStart), 1);
}

#[tokio::test]
async fn test_stage_filtered_hooks_fire_only_on_their_stage() {
    let first_only = Arc::new(CollectingHook::new());
    let every_stage = Arc::new(CollectingHook::new());
    let job_type = JobType::builder("filtered")
        .asynchronous(false)
        .stage_fn("first", |_| Ok(json!(1)))
        .stage_fn("second", |_| Ok(json!(2)))
        .before_stage(Some("first"), first_only.clone())
        .before_stage(None, every_stage.clone())
        .build();

    let engine = ExecutionEngine::new(Arc::new(job_type), Arc::new(RecordingScheduler::new()));
    engine.start(Params::new()).await.unwrap();

    assert_eq!(
        first_only.events(),
        vec![(HookEvent::BeforeStage, Some("first".to_string()))]
    );
    assert_eq!(every_stage.len(), 2);
}

#[tokio::test]
async fn test_unhandled_failure_escalates_to_caller() {
    let after_stage = Arc::new(CollectingHook::new());
    let after_finish = Arc::new(CollectingHook::new());
    let job_type = JobType::builder("failing")
        .stage_fn("boom", |_| Err(anyhow::anyhow!("this stage should not complete")))
        .after_stage(None, after_stage.clone())
        .after_finish(after_finish.clone())
        .build();

    let engine = ExecutionEngine::new(Arc::new(job_type), Arc::new(RecordingScheduler::new()));
    let mut job = JobInstance::new();

    let err = engine.perform(&mut job, None, Params::new()).await.unwrap_err();

    match err {
        JobflowError::Stage(failure) => {
            assert_eq!(failure.stage(), "boom");
            assert_eq!(failure.message(), "this stage should not complete");
        }
        other => panic!("expected stage failure, got {other:?}"),
    }
    assert!(job.is_failed());
    assert!(!job.output().contains("boom"));
    assert!(after_stage.is_empty());
    assert!(after_finish.is_empty());
}

#[tokio::test]
async fn test_registered_error_hook_handles_the_failure() {
    let on_error = Arc::new(CollectingHook::new());
    let job_type = JobType::builder("handled")
        .stage_fn("boom", |_| Err(anyhow::anyhow!("expected failure")))
        .on_error(on_error.clone())
        .build();

    let engine = ExecutionEngine::new(Arc::new(job_type), Arc::new(RecordingScheduler::new()));
    let mut job = JobInstance::new();

    let outcome = engine.perform(&mut job, None, Params::new()).await.unwrap();

    match outcome {
        Outcome::Failed(failure) => assert_eq!(failure.stage(), "boom"),
        other => panic!("expected handled failure, got {other:?}"),
    }
    assert!(job.is_failed());
    assert_eq!(on_error.count_of(HookEvent::OnError), 1);
}

#[tokio::test]
async fn test_error_hook_receives_the_failure() {
    let seen_message = Arc::new(Mutex::new(None));
    let seen = seen_message.clone();
    let job_type = JobType::builder("observed")
        .stage_fn("boom", |_| Err(anyhow::anyhow!("boom happened")))
        .on_error_fn(move |ctx| {
            *seen.lock() = ctx.error().map(crate::errors::StageFailure::message);
            Ok(())
        })
        .build();

    let engine = ExecutionEngine::new(Arc::new(job_type), Arc::new(RecordingScheduler::new()));
    let mut job = JobInstance::new();

    engine.perform(&mut job, None, Params::new()).await.unwrap();

    assert_eq!(seen_message.lock().as_deref(), Some("boom happened"));
}

#[tokio::test]
async fn test_hook_error_propagates_from_dispatch_point() {
    let job_type = JobType::builder("bad-hook")
        .stage_fn("first", |_| Ok(json!(1)))
        .before_stage_fn(None, |_| Err(anyhow::anyhow!("hook broke")))
        .build();

    let engine = ExecutionEngine::new(Arc::new(job_type), Arc::new(RecordingScheduler::new()));
    let mut job = JobInstance::new();

    let err = engine.perform(&mut job, None, Params::new()).await.unwrap_err();

    assert!(matches!(err, JobflowError::Hook(_)));
    // The stage never ran.
    assert!(job.output().is_empty());
    assert!(job.is_running());
}

#[tokio::test]
async fn test_no_hooks_fire_when_validation_fails() {
    let hook = Arc::new(CollectingHook::new());
    let job_type = JobType::builder("strict")
        .required_params(&["x"])
        .stage_fn("first", |_| Ok(json!(1)))
        .before_start(hook.clone())
        .before_stage(None, hook.clone())
        .on_error(hook.clone())
        .build();

    let engine = ExecutionEngine::new(Arc::new(job_type), Arc::new(RecordingScheduler::new()));
    let mut job = JobInstance::new();

    let err = engine.perform(&mut job, None, Params::new()).await.unwrap_err();

    assert!(matches!(err, JobflowError::Validation(_)));
    assert!(hook.is_empty());
}

#[tokio::test]
async fn test_resume_rejects_foreign_job_type() {
    let job_type = JobType::builder("ours")
        .stage_fn("first", |_| Ok(json!(1)))
        .build();
    let engine = ExecutionEngine::new(Arc::new(job_type), Arc::new(RecordingScheduler::new()));

    let request =
        ContinuationRequest::new("theirs", "first", Params::new(), OutputMap::new());
    let err = engine.resume(request).await.unwrap_err();

    assert!(matches!(
        err,
        JobflowError::Configuration(ConfigurationError::WrongJobType { .. })
    ));
}

#[tokio::test]
async fn test_derived_type_runs_independently_of_parent() {
    let parent = JobType::builder("parent")
        .asynchronous(false)
        .stage_fn("first", |_| Ok(json!("parent first")))
        .build();
    let child = parent
        .derive("child")
        .stage_fn("second", |_| Ok(json!("child second")))
        .build();

    let parent_engine =
        ExecutionEngine::new(Arc::new(parent), Arc::new(RecordingScheduler::new()));
    let child_engine = ExecutionEngine::new(Arc::new(child), Arc::new(RecordingScheduler::new()));

    let (parent_job, _) = parent_engine.start(Params::new()).await.unwrap();
    let (child_job, _) = child_engine.start(Params::new()).await.unwrap();

    assert_eq!(parent_job.output().len(), 1);
    assert_eq!(child_job.output().len(), 2);
    assert_eq!(
        child_job.output().get("second"),
        Some(&json!("child second"))
    );
}
