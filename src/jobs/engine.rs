//! Job execution: creation, scheduling, lifecycle, and cancellation.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::stream::BoxStream;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::activity::JobEvent;
use super::broadcast::{EventBroadcaster, ProgressEmitter};
use super::model::{Job, LogLevel};
use super::state::JobStatus;
use super::store::{JobHandle, JobStore};
use crate::config::EngineConfig;
use crate::error::{Error, ToolError};
use crate::tools::{Parameters, ToolRegistry};

/// Creates jobs, runs them on background tasks, and drives their lifecycle.
///
/// Cheap to clone; clones share the same store, broadcaster, and slots.
#[derive(Clone)]
pub struct ExecutionEngine {
    tools: Arc<ToolRegistry>,
    store: Arc<JobStore>,
    broadcaster: Arc<EventBroadcaster>,
    /// Execution slots. Jobs waiting for a slot stay `Pending`.
    slots: Arc<Semaphore>,
    /// Jobs scheduled or running, for status queries.
    tracked: Arc<RwLock<HashMap<Uuid, JoinHandle<()>>>>,
}

impl ExecutionEngine {
    pub fn new(tools: Arc<ToolRegistry>, config: EngineConfig) -> Self {
        let store = Arc::new(JobStore::new());
        let broadcaster = Arc::new(EventBroadcaster::new(Arc::clone(&store), &config));
        Self {
            tools,
            store,
            broadcaster,
            slots: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            tracked: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validate parameters and create a `Pending` job. Never runs tool code.
    pub async fn create_job(&self, tool_id: &str, parameters: Parameters) -> Result<Job, Error> {
        let tool = self.tools.get(tool_id).await.ok_or_else(|| ToolError::NotFound {
            id: tool_id.to_string(),
        })?;

        tool.validate(&parameters)
            .map_err(|reason| ToolError::InvalidParameters {
                id: tool_id.to_string(),
                reason,
            })?;

        let job = Job::new(tool.id(), tool.definition().name.clone(), parameters);
        self.store.insert(job.clone()).await;
        self.broadcaster.open(job.id).await;

        info!(job_id = %job.id, tool = %tool_id, "Job created");
        Ok(job)
    }

    /// Schedule a job on a background task. Returns immediately.
    ///
    /// Returns `false` (and does nothing) if the job does not exist or was
    /// already scheduled.
    pub async fn start_execution(&self, job_id: Uuid) -> bool {
        let Some(handle) = self.store.get(job_id).await else {
            warn!(job_id = %job_id, "Cannot start job: not found");
            return false;
        };

        let mut tracked = self.tracked.write().await;
        if tracked.contains_key(&job_id) || handle.status().await != JobStatus::Pending {
            debug!(job_id = %job_id, "Job already scheduled");
            return false;
        }

        let engine = self.clone();
        let task = tokio::spawn(async move { engine.run(handle).await });
        tracked.insert(job_id, task);

        debug!(job_id = %job_id, "Job scheduled");
        true
    }

    /// Create a job and immediately schedule it.
    pub async fn submit(&self, tool_id: &str, parameters: Parameters) -> Result<Job, Error> {
        let job = self.create_job(tool_id, parameters).await?;
        self.start_execution(job.id).await;
        Ok(job)
    }

    /// Cancel a running job. No-op (returns `false`) unless the job is `Running`.
    ///
    /// The tool is not interrupted; it observes the new status on its next check.
    pub async fn cancel_job(&self, job_id: Uuid) -> bool {
        let Some(handle) = self.store.get(job_id).await else {
            return false;
        };

        let (cancelled, snapshot) = handle
            .update(|job| job.status == JobStatus::Running && job.cancel().is_ok())
            .await;
        if !cancelled {
            debug!(job_id = %job_id, status = %snapshot.status, "Cancel ignored: job not running");
            return false;
        }

        info!(job_id = %job_id, processed = snapshot.processed_items, "Job cancelled");
        self.broadcaster.publish(&snapshot).await;
        self.broadcaster
            .publish_event(JobEvent::run_cancelled(job_id))
            .await;
        self.broadcaster.close(job_id).await;
        true
    }

    pub async fn get_job(&self, job_id: Uuid) -> Option<Job> {
        self.store.snapshot(job_id).await
    }

    /// All jobs, most recently started first.
    pub async fn list_jobs(&self) -> Vec<Job> {
        self.store.list().await
    }

    pub async fn recent_jobs(&self, limit: usize) -> Vec<Job> {
        self.store.recent(limit).await
    }

    /// Live snapshots for a job; see [`EventBroadcaster::subscribe`].
    pub async fn subscribe(&self, job_id: Uuid) -> BoxStream<'static, Job> {
        self.broadcaster.subscribe(job_id).await
    }

    /// Live activity events for a job.
    pub async fn subscribe_events(&self, job_id: Uuid) -> BoxStream<'static, JobEvent> {
        self.broadcaster.subscribe_events(job_id).await
    }

    /// Whether a job is scheduled or running on this engine.
    pub async fn is_tracked(&self, job_id: Uuid) -> bool {
        self.tracked.read().await.contains_key(&job_id)
    }

    /// Number of jobs scheduled or running.
    pub async fn tracked_count(&self) -> usize {
        self.tracked.read().await.len()
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    async fn run(self, handle: JobHandle) {
        let job_id = handle.id();

        let _permit = match Arc::clone(&self.slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!(job_id = %job_id, "Execution slots closed; job not started");
                self.untrack(job_id).await;
                return;
            }
        };

        let (started, snapshot) = handle
            .update(|job| {
                job.transition_to(JobStatus::Running)?;
                job.add_log(LogLevel::Info, "Job started")
            })
            .await;
        if let Err(e) = started {
            warn!(job_id = %job_id, error = %e, "Job could not start");
            self.untrack(job_id).await;
            return;
        }

        info!(job_id = %job_id, tool = %snapshot.tool_id, "Job started");
        self.broadcaster.publish(&snapshot).await;
        self.broadcaster
            .publish_event(JobEvent::run_started(job_id))
            .await;
        self.broadcaster
            .publish_event(JobEvent::tool_call_start(&snapshot))
            .await;

        let fault = match self.tools.get(&snapshot.tool_id).await {
            Some(tool) => {
                let emitter = ProgressEmitter::new(handle.clone(), Arc::clone(&self.broadcaster));
                match AssertUnwindSafe(tool.execute(&handle, &emitter))
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(payload) => Some(panic_message(payload)),
                }
            }
            None => Some(
                ToolError::NotFound {
                    id: snapshot.tool_id.clone(),
                }
                .to_string(),
            ),
        };

        self.finalize(&handle, fault).await;
        self.untrack(job_id).await;
    }

    /// Terminal transition, final snapshot, channel teardown.
    ///
    /// Whoever performs the terminal transition publishes the final snapshot
    /// and closes the channel. If the job was cancelled while the tool ran,
    /// `cancel_job` already did both and this is a no-op.
    async fn finalize(&self, handle: &JobHandle, fault: Option<String>) {
        let job_id = handle.id();
        let (result, snapshot) = handle
            .update(|job| match &fault {
                None => job.complete(),
                Some(message) => job.fail(message.clone()),
            })
            .await;

        if result.is_err() {
            debug!(job_id = %job_id, status = %snapshot.status, "Job already finalized");
            return;
        }

        match &fault {
            None => {
                info!(
                    job_id = %job_id,
                    total = snapshot.total_items,
                    success = snapshot.success_count,
                    errors = snapshot.error_count,
                    skipped = snapshot.skipped_count,
                    "Job completed"
                );
                self.broadcaster
                    .publish_event(JobEvent::tool_call_end(&snapshot))
                    .await;
                self.broadcaster
                    .publish_event(JobEvent::run_finished(&snapshot))
                    .await;
            }
            Some(message) => {
                error!(job_id = %job_id, error = %message, "Job failed");
                self.broadcaster
                    .publish_event(JobEvent::run_error(job_id, message.clone()))
                    .await;
            }
        }

        self.broadcaster.publish(&snapshot).await;
        self.broadcaster.close(job_id).await;
    }

    async fn untrack(&self, job_id: Uuid) {
        self.tracked.write().await.remove(&job_id);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("Tool panicked: {detail}"),
        None => "Tool panicked".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::model::JobResult;
    use crate::tools::{Tool, ToolDefinition, ToolParameter, ParameterType};
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::time::Duration;

    #[derive(Debug)]
    struct CountingTool {
        definition: ToolDefinition,
        items: u64,
    }

    impl CountingTool {
        fn new(items: u64) -> Self {
            Self {
                definition: ToolDefinition {
                    id: "counter".into(),
                    name: "Counter".into(),
                    description: "Counts".into(),
                    category: "Test".into(),
                    icon: None,
                    parameters: vec![ToolParameter::new(
                        "root_path",
                        "Root Path",
                        "Path",
                        ParameterType::Path,
                    )
                    .required()],
                    destructive: false,
                    requires_external_system: false,
                },
                items,
            }
        }
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, job: &JobHandle, progress: &ProgressEmitter) -> Result<(), ToolError> {
            job.set_total_items(self.items).await.ok();
            for i in 0..self.items {
                if job.is_cancelled().await {
                    break;
                }
                job.add_result(JobResult::success(format!("/content/{i}"), "ok"))
                    .await
                    .ok();
                progress.emit().await;
            }
            Ok(())
        }
    }

    async fn engine_with(tool: CountingTool) -> ExecutionEngine {
        let tools = Arc::new(ToolRegistry::new());
        tools.register(Arc::new(tool)).await.unwrap();
        ExecutionEngine::new(tools, EngineConfig::default())
    }

    fn params() -> Parameters {
        serde_json::json!({"root_path": "/content"})
            .as_object()
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn create_job_unknown_tool() {
        let engine = engine_with(CountingTool::new(1)).await;
        let err = engine.create_job("nope", params()).await.unwrap_err();
        assert!(matches!(err, Error::Tool(ToolError::NotFound { .. })));
        assert!(engine.list_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn create_job_opens_channel_and_stays_pending() {
        let engine = engine_with(CountingTool::new(1)).await;
        let job = engine.create_job("counter", params()).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.tool_name, "Counter");
        assert!(engine.broadcaster().is_open(job.id).await);
        assert!(!engine.is_tracked(job.id).await);
    }

    #[tokio::test]
    async fn start_missing_job_is_noop() {
        let engine = engine_with(CountingTool::new(1)).await;
        assert!(!engine.start_execution(Uuid::new_v4()).await);
        assert_eq!(engine.tracked_count().await, 0);
    }

    #[tokio::test]
    async fn run_to_completion() {
        let engine = engine_with(CountingTool::new(3)).await;
        let job = engine.create_job("counter", params()).await.unwrap();
        let stream = engine.subscribe(job.id).await;
        assert!(engine.start_execution(job.id).await);
        assert!(!engine.start_execution(job.id).await);

        let snapshots: Vec<Job> = tokio::time::timeout(Duration::from_secs(5), stream.collect())
            .await
            .unwrap();
        let last = snapshots.last().unwrap();
        assert_eq!(last.status, JobStatus::Completed);
        assert_eq!(last.processed_items, 3);
        assert!(last.completed_at.is_some());
        assert!(!engine.broadcaster().is_open(job.id).await);
    }

    #[tokio::test]
    async fn cancel_pending_job_is_noop() {
        let engine = engine_with(CountingTool::new(1)).await;
        let job = engine.create_job("counter", params()).await.unwrap();
        assert!(!engine.cancel_job(job.id).await);
        let after = engine.get_job(job.id).await.unwrap();
        assert_eq!(after.status, JobStatus::Pending);
        assert_eq!(after.revision, job.revision);
        assert!(engine.broadcaster().is_open(job.id).await);
    }

    #[tokio::test]
    async fn cancel_unknown_job_is_noop() {
        let engine = engine_with(CountingTool::new(1)).await;
        assert!(!engine.cancel_job(Uuid::new_v4()).await);
    }

    #[test]
    fn panic_message_extracts_payload() {
        assert_eq!(panic_message(Box::new("boom")), "Tool panicked: boom");
        assert_eq!(
            panic_message(Box::new(String::from("bang"))),
            "Tool panicked: bang"
        );
        assert_eq!(panic_message(Box::new(42u8)), "Tool panicked");
    }
}
