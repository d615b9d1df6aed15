//! Continuation scheduling.
//!
//! The engine never runs a queue itself. When an asynchronous job type
//! finishes a non-final stage, the engine hands a [`ContinuationRequest`]
//! to a [`ContinuationScheduler`] and returns; whatever collaborator owns
//! the queue later redelivers the request to
//! [`ExecutionEngine::resume`](crate::engine::ExecutionEngine::resume).
//! Once scheduled, a continuation cannot be retracted.

use crate::core::{OutputMap, Params};
use crate::errors::SchedulerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// The full carried state needed to resume a job at a given stage.
///
/// This is the wire-facing shape handed to the external queue; nothing
/// else survives the suspension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationRequest {
    job_type: String,
    stage: String,
    params: Params,
    output: OutputMap,
    started: bool,
}

impl ContinuationRequest {
    /// Creates a request to resume `job_type` at `stage`.
    ///
    /// The started flag defaults to true: by the time a continuation is
    /// scheduled, `before_start` has already fired for the logical job.
    #[must_use]
    pub fn new(
        job_type: impl Into<String>,
        stage: impl Into<String>,
        params: Params,
        output: OutputMap,
    ) -> Self {
        Self {
            job_type: job_type.into(),
            stage: stage.into(),
            params,
            output,
            started: true,
        }
    }

    /// Overrides the started flag.
    #[must_use]
    pub fn with_started(mut self, started: bool) -> Self {
        self.started = started;
        self
    }

    /// The job type to resume.
    #[must_use]
    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    /// The stage to resume at.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// The parameters threaded through the resumption, unchanged.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The outputs accumulated before the suspension.
    #[must_use]
    pub fn output(&self) -> &OutputMap {
        &self.output
    }

    /// Whether `before_start` already fired for this logical job.
    #[must_use]
    pub fn started(&self) -> bool {
        self.started
    }
}

/// Opaque receipt for a scheduled continuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuationHandle {
    id: Uuid,
    run_at: DateTime<Utc>,
}

impl ContinuationHandle {
    /// Creates a handle for a continuation due after `delay`.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        let delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            id: Uuid::new_v4(),
            run_at: Utc::now() + delay,
        }
    }

    /// The handle's unique id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When the continuation is due to run.
    #[must_use]
    pub fn run_at(&self) -> DateTime<Utc> {
        self.run_at
    }
}

/// Contract for the collaborator that persists and redelivers
/// continuations.
///
/// Implementations decide how a request is stored and delivered; the
/// engine only distinguishes "after a delay" from "immediately".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContinuationScheduler: Send + Sync {
    /// Queues `request` to be delivered after `delay`.
    async fn schedule_after(
        &self,
        delay: Duration,
        request: ContinuationRequest,
    ) -> Result<ContinuationHandle, SchedulerError>;

    /// Delivers `request` immediately, bypassing the delay queue.
    async fn run_now(
        &self,
        request: ContinuationRequest,
    ) -> Result<ContinuationHandle, SchedulerError>;
}

/// A scheduler that records every request, for tests.
///
/// Continuation arguments are verified by inspecting this double's
/// recorded requests.
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    scheduled: parking_lot::Mutex<Vec<(Duration, ContinuationRequest)>>,
    immediate: parking_lot::Mutex<Vec<ContinuationRequest>>,
}

impl RecordingScheduler {
    /// Creates a new recording scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every `(delay, request)` pair passed to `schedule_after`.
    #[must_use]
    pub fn scheduled(&self) -> Vec<(Duration, ContinuationRequest)> {
        self.scheduled.lock().clone()
    }

    /// Returns every request passed to `run_now`.
    #[must_use]
    pub fn immediate(&self) -> Vec<ContinuationRequest> {
        self.immediate.lock().clone()
    }

    /// Returns the most recently scheduled request.
    #[must_use]
    pub fn last_scheduled(&self) -> Option<ContinuationRequest> {
        self.scheduled.lock().last().map(|(_, r)| r.clone())
    }

    /// Returns true if nothing was handed off.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scheduled.lock().is_empty() && self.immediate.lock().is_empty()
    }

    /// Clears the recorded requests.
    pub fn clear(&self) {
        self.scheduled.lock().clear();
        self.immediate.lock().clear();
    }
}

#[async_trait]
impl ContinuationScheduler for RecordingScheduler {
    async fn schedule_after(
        &self,
        delay: Duration,
        request: ContinuationRequest,
    ) -> Result<ContinuationHandle, SchedulerError> {
        let handle = ContinuationHandle::new(delay);
        self.scheduled.lock().push((delay, request));
        Ok(handle)
    }

    async fn run_now(
        &self,
        request: ContinuationRequest,
    ) -> Result<ContinuationHandle, SchedulerError> {
        let handle = ContinuationHandle::new(Duration::ZERO);
        self.immediate.lock().push(request);
        Ok(handle)
    }
}

/// A tokio mpsc-backed scheduler.
///
/// `schedule_after` sleeps in a spawned task before sending, `run_now`
/// sends directly. The receiving half goes to the embedder's worker
/// loop, which redelivers each request through the engine.
#[derive(Debug, Clone)]
pub struct ChannelScheduler {
    tx: mpsc::UnboundedSender<ContinuationRequest>,
}

impl ChannelScheduler {
    /// Creates a scheduler and the receiver a worker loop drains.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ContinuationRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ContinuationScheduler for ChannelScheduler {
    async fn schedule_after(
        &self,
        delay: Duration,
        request: ContinuationRequest,
    ) -> Result<ContinuationHandle, SchedulerError> {
        if self.tx.is_closed() {
            return Err(SchedulerError::QueueClosed);
        }

        let handle = ContinuationHandle::new(delay);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(request);
        });

        Ok(handle)
    }

    async fn run_now(
        &self,
        request: ContinuationRequest,
    ) -> Result<ContinuationHandle, SchedulerError> {
        let handle = ContinuationHandle::new(Duration::ZERO);
        self.tx
            .send(request)
            .map_err(|_| SchedulerError::QueueClosed)?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request() -> ContinuationRequest {
        let params = Params::new().with("x", json!(1));
        let mut output = OutputMap::new();
        output.record("a", json!("done"));
        ContinuationRequest::new("demo", "b", params, output)
    }

    #[test]
    fn test_request_defaults_to_started() {
        let request = request();
        assert!(request.started());
        assert!(!request.clone().with_started(false).started());
    }

    #[test]
    fn test_request_serde_round_trip() {
        let request = request();
        let json = serde_json::to_string(&request).unwrap();
        let back: ContinuationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn test_handle_run_at_honors_delay() {
        let before = Utc::now();
        let handle = ContinuationHandle::new(Duration::from_secs(60));
        assert!(handle.run_at() >= before + chrono::Duration::seconds(59));
    }

    #[tokio::test]
    async fn test_recording_scheduler_records_both_paths() {
        let scheduler = RecordingScheduler::new();
        assert!(scheduler.is_empty());

        scheduler
            .schedule_after(Duration::from_secs(1), request())
            .await
            .unwrap();
        scheduler.run_now(request()).await.unwrap();

        assert_eq!(scheduler.scheduled().len(), 1);
        assert_eq!(scheduler.scheduled()[0].0, Duration::from_secs(1));
        assert_eq!(scheduler.immediate().len(), 1);
        assert_eq!(scheduler.last_scheduled().unwrap().stage(), "b");
    }

    #[tokio::test]
    async fn test_channel_scheduler_delivers_after_delay() {
        let (scheduler, mut rx) = ChannelScheduler::new();

        scheduler
            .schedule_after(Duration::from_millis(5), request())
            .await
            .unwrap();

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.stage(), "b");
        assert_eq!(delivered.output().get("a"), Some(&json!("done")));
    }

    #[tokio::test]
    async fn test_channel_scheduler_run_now_delivers_immediately() {
        let (scheduler, mut rx) = ChannelScheduler::new();

        scheduler.run_now(request()).await.unwrap();

        let delivered = rx.try_recv().unwrap();
        assert_eq!(delivered.job_type(), "demo");
    }

    #[tokio::test]
    async fn test_channel_scheduler_errors_when_queue_closed() {
        let (scheduler, rx) = ChannelScheduler::new();
        drop(rx);

        let err = scheduler.run_now(request()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::QueueClosed));

        let err = scheduler
            .schedule_after(Duration::ZERO, request())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::QueueClosed));
    }
}
