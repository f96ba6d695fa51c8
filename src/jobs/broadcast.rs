//! Per-job event broadcaster.
//!
//! Each non-terminal job owns a pair of `tokio::sync::broadcast` channels: one
//! carrying full [`Job`] snapshots, one carrying [`JobEvent`]s. The pair is
//! opened when the job is created and removed right after the terminal
//! snapshot is published. Subscribers receive:
//!
//! - one immediate snapshot of the current state,
//! - every later snapshot in non-decreasing `revision` order (stale or
//!   duplicate snapshots are dropped, as are snapshots a lagging subscriber
//!   fell too far behind on),
//! - the terminal snapshot, after which the stream ends.
//!
//! A stream also ends after `stream_idle_timeout` without a new event.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};
use uuid::Uuid;

use super::activity::JobEvent;
use super::model::Job;
use super::store::{JobHandle, JobStore};
use crate::config::EngineConfig;

struct JobChannel {
    snapshots: broadcast::Sender<Job>,
    events: broadcast::Sender<JobEvent>,
}

/// Fans job snapshots and activity events out to live subscribers.
pub struct EventBroadcaster {
    store: Arc<JobStore>,
    channels: RwLock<HashMap<Uuid, JobChannel>>,
    capacity: usize,
    idle_timeout: Duration,
}

impl EventBroadcaster {
    pub fn new(store: Arc<JobStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            channels: RwLock::new(HashMap::new()),
            capacity: config.broadcast_capacity.max(1),
            idle_timeout: config.stream_idle_timeout,
        }
    }

    /// Open the channel pair for a job. Re-opening an open channel is a no-op.
    pub async fn open(&self, job_id: Uuid) {
        let mut channels = self.channels.write().await;
        channels.entry(job_id).or_insert_with(|| {
            let (snapshots, _) = broadcast::channel(self.capacity);
            let (events, _) = broadcast::channel(self.capacity);
            JobChannel { snapshots, events }
        });
        debug!(job_id = %job_id, "Opened job channel");
    }

    pub async fn is_open(&self, job_id: Uuid) -> bool {
        self.channels.read().await.contains_key(&job_id)
    }

    /// Number of jobs with an open channel.
    pub async fn open_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Push a snapshot to current subscribers. Returns how many received it.
    pub async fn publish(&self, job: &Job) -> usize {
        match self.channels.read().await.get(&job.id) {
            // No receivers is fine.
            Some(channel) => channel.snapshots.send(job.clone()).unwrap_or(0),
            None => 0,
        }
    }

    /// Push an activity event to current subscribers.
    pub async fn publish_event(&self, event: JobEvent) -> usize {
        match self.channels.read().await.get(&event.job_id()) {
            Some(channel) => channel.events.send(event).unwrap_or(0),
            None => 0,
        }
    }

    /// Close and remove a job's channels. Subscribers drain what is buffered
    /// and then end. Returns `false` if the channel was already gone.
    pub async fn close(&self, job_id: Uuid) -> bool {
        let removed = self.channels.write().await.remove(&job_id).is_some();
        if removed {
            debug!(job_id = %job_id, "Closed job channel");
        }
        removed
    }

    /// Live snapshot stream for a job. Unknown job ids yield an empty stream.
    pub async fn subscribe(&self, job_id: Uuid) -> BoxStream<'static, Job> {
        let Some(handle) = self.store.get(job_id).await else {
            return stream::empty().boxed();
        };

        // Subscribe before reading the initial snapshot so nothing published
        // in between is missed; anything older is filtered by revision.
        let rx = self
            .channels
            .read()
            .await
            .get(&job_id)
            .map(|c| c.snapshots.subscribe());
        let initial = handle.snapshot().await;

        let subscriber = SnapshotSubscriber {
            handle,
            rx,
            initial: Some(initial),
            last_revision: None,
            done: false,
            idle_timeout: self.idle_timeout,
        };

        stream::unfold(subscriber, |mut sub| async move {
            sub.next_snapshot().await.map(|job| (job, sub))
        })
        .boxed()
    }

    /// Live activity-event stream for a job. Events are not replayed: a
    /// subscriber sees only what is published after it subscribes.
    pub async fn subscribe_events(&self, job_id: Uuid) -> BoxStream<'static, JobEvent> {
        let Some(rx) = self
            .channels
            .read()
            .await
            .get(&job_id)
            .map(|c| c.events.subscribe())
        else {
            return stream::empty().boxed();
        };

        let idle_timeout = self.idle_timeout;
        stream::unfold(Some(rx), move |rx| async move {
            let mut rx = rx?;
            loop {
                match tokio::time::timeout(idle_timeout, rx.recv()).await {
                    Err(_) => {
                        debug!(job_id = %job_id, "Event stream idle timeout");
                        return None;
                    }
                    Ok(Ok(event)) => {
                        let next = if event.is_terminal() { None } else { Some(rx) };
                        return Some((event, next));
                    }
                    Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                        warn!(job_id = %job_id, missed = n, "Event subscriber lagged");
                    }
                    Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                }
            }
        })
        .boxed()
    }
}

struct SnapshotSubscriber {
    handle: JobHandle,
    rx: Option<broadcast::Receiver<Job>>,
    initial: Option<Job>,
    last_revision: Option<u64>,
    done: bool,
    idle_timeout: Duration,
}

impl SnapshotSubscriber {
    async fn next_snapshot(&mut self) -> Option<Job> {
        if self.done {
            return None;
        }
        if let Some(initial) = self.initial.take() {
            return Some(self.deliver(initial));
        }

        loop {
            let Some(rx) = self.rx.as_mut() else {
                return self.final_from_store().await;
            };

            match tokio::time::timeout(self.idle_timeout, rx.recv()).await {
                Err(_) => {
                    debug!(job_id = %self.handle.id(), "Snapshot stream idle timeout");
                    self.done = true;
                    return None;
                }
                Ok(Ok(job)) => {
                    if self.is_stale(&job) {
                        continue;
                    }
                    return Some(self.deliver(job));
                }
                Ok(Err(broadcast::error::RecvError::Lagged(n))) => {
                    warn!(job_id = %self.handle.id(), missed = n, "Snapshot subscriber lagged");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    self.rx = None;
                    return self.final_from_store().await;
                }
            }
        }
    }

    /// The channel is gone: the job reached a terminal state. Deliver the
    /// stored final snapshot unless it was already delivered.
    async fn final_from_store(&mut self) -> Option<Job> {
        self.done = true;
        let job = self.handle.snapshot().await;
        if self.is_stale(&job) {
            return None;
        }
        self.last_revision = Some(job.revision);
        Some(job)
    }

    fn is_stale(&self, job: &Job) -> bool {
        self.last_revision.is_some_and(|last| job.revision <= last)
    }

    fn deliver(&mut self, job: Job) -> Job {
        self.last_revision = Some(job.revision);
        if job.status.is_terminal() {
            self.done = true;
        }
        job
    }
}

/// Capability handed to a running tool for notifying observers.
///
/// [`emit`](Self::emit) publishes the job's current snapshot and a
/// `state_delta` event. It never waits on subscribers.
#[derive(Clone)]
pub struct ProgressEmitter {
    job: JobHandle,
    broadcaster: Arc<EventBroadcaster>,
}

impl ProgressEmitter {
    pub fn new(job: JobHandle, broadcaster: Arc<EventBroadcaster>) -> Self {
        Self { job, broadcaster }
    }

    pub async fn emit(&self) {
        let snapshot = self.job.snapshot().await;
        self.broadcaster.publish(&snapshot).await;
        self.broadcaster
            .publish_event(JobEvent::state_delta(&snapshot))
            .await;
    }
}

impl std::fmt::Debug for ProgressEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressEmitter")
            .field("job_id", &self.job.id())
            .finish()
    }
}
