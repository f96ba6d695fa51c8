//! Concurrent map of job id to job record.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::{Job, JobResult, LogLevel};
use super::state::JobStatus;
use crate::error::JobError;
use crate::tools::Parameters;

/// Shared handle to a single job record.
///
/// All writes to one job go through its own lock, so writers to the same job
/// are serialized while different jobs never contend. Readers take clones.
#[derive(Debug, Clone)]
pub struct JobHandle {
    id: Uuid,
    inner: Arc<RwLock<Job>>,
}

impl JobHandle {
    fn new(job: Job) -> Self {
        Self {
            id: job.id,
            inner: Arc::new(RwLock::new(job)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Point-in-time copy of the job.
    pub async fn snapshot(&self) -> Job {
        self.inner.read().await.clone()
    }

    pub async fn status(&self) -> JobStatus {
        self.inner.read().await.status
    }

    /// Tools poll this between units of work.
    pub async fn is_cancelled(&self) -> bool {
        self.status().await == JobStatus::Cancelled
    }

    pub async fn parameters(&self) -> Parameters {
        self.inner.read().await.parameters.clone()
    }

    pub async fn add_log(&self, level: LogLevel, message: impl Into<String>) -> Result<(), JobError> {
        self.inner.write().await.add_log(level, message)
    }

    /// Record a result together with its counter increment.
    pub async fn add_result(&self, result: JobResult) -> Result<(), JobError> {
        self.inner.write().await.add_result(result)
    }

    pub async fn set_total_items(&self, total: u64) -> Result<(), JobError> {
        self.inner.write().await.set_total_items(total)
    }

    /// Apply `f` under the job's write lock and return its output along with
    /// a snapshot taken under the same lock.
    pub(crate) async fn update<F, R>(&self, f: F) -> (R, Job)
    where
        F: FnOnce(&mut Job) -> R,
    {
        let mut job = self.inner.write().await;
        let out = f(&mut job);
        (out, job.clone())
    }
}

/// In-memory job store. Jobs live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, JobHandle>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new job and return its handle.
    pub async fn insert(&self, job: Job) -> JobHandle {
        let handle = JobHandle::new(job);
        self.jobs.write().await.insert(handle.id(), handle.clone());
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<JobHandle> {
        self.jobs.read().await.get(&id).cloned()
    }

    pub async fn snapshot(&self, id: Uuid) -> Option<Job> {
        match self.get(id).await {
            Some(handle) => Some(handle.snapshot().await),
            None => None,
        }
    }

    /// All jobs, most recently started first. Jobs that never started sort last.
    pub async fn list(&self) -> Vec<Job> {
        // Clone the handles out so the map lock is not held across per-job reads.
        let handles: Vec<JobHandle> = self.jobs.read().await.values().cloned().collect();

        let mut jobs = Vec::with_capacity(handles.len());
        for handle in handles {
            jobs.push(handle.snapshot().await);
        }
        jobs.sort_by_key(|job| (Reverse(job.started_at), Reverse(job.created_at)));
        jobs
    }

    /// The first `limit` jobs of [`list`](Self::list).
    pub async fn recent(&self, limit: usize) -> Vec<Job> {
        let mut jobs = self.list().await;
        jobs.truncate(limit);
        jobs
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
