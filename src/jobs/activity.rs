//! Structured activity events streamed alongside job snapshots.
//!
//! Snapshots carry the whole job; these events describe *what happened*
//! (run started, progress delta, tool finished) for clients that render a
//! timeline instead of re-rendering the full record.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::model::Job;
use super::state::JobStatus;

/// Activity messages broadcast during job execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// The job left `Pending` and is now running.
    RunStarted { job_id: Uuid, timestamp: i64 },
    /// The tool body is about to be invoked.
    ToolCallStart {
        job_id: Uuid,
        timestamp: i64,
        tool_id: String,
        tool_name: String,
    },
    /// Progress counters changed.
    StateDelta {
        job_id: Uuid,
        timestamp: i64,
        status: JobStatus,
        processed_items: u64,
        total_items: u64,
        success_count: u64,
        error_count: u64,
        progress_percent: f64,
    },
    /// The tool body returned normally.
    ToolCallEnd {
        job_id: Uuid,
        timestamp: i64,
        tool_id: String,
        summary: serde_json::Value,
    },
    /// Job completed.
    RunFinished {
        job_id: Uuid,
        timestamp: i64,
        summary: serde_json::Value,
    },
    /// Job failed.
    RunError {
        job_id: Uuid,
        timestamp: i64,
        error: String,
    },
    /// Job cancelled by the user.
    RunCancelled { job_id: Uuid, timestamp: i64 },
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl JobEvent {
    pub fn run_started(job_id: Uuid) -> Self {
        Self::RunStarted {
            job_id,
            timestamp: now_millis(),
        }
    }

    pub fn tool_call_start(job: &Job) -> Self {
        Self::ToolCallStart {
            job_id: job.id,
            timestamp: now_millis(),
            tool_id: job.tool_id.clone(),
            tool_name: job.tool_name.clone(),
        }
    }

    pub fn state_delta(job: &Job) -> Self {
        Self::StateDelta {
            job_id: job.id,
            timestamp: now_millis(),
            status: job.status,
            processed_items: job.processed_items,
            total_items: job.total_items,
            success_count: job.success_count,
            error_count: job.error_count,
            progress_percent: job.progress_percent(),
        }
    }

    pub fn tool_call_end(job: &Job) -> Self {
        Self::ToolCallEnd {
            job_id: job.id,
            timestamp: now_millis(),
            tool_id: job.tool_id.clone(),
            summary: job.summary(),
        }
    }

    pub fn run_finished(job: &Job) -> Self {
        Self::RunFinished {
            job_id: job.id,
            timestamp: now_millis(),
            summary: job.summary(),
        }
    }

    pub fn run_error(job_id: Uuid, error: impl Into<String>) -> Self {
        Self::RunError {
            job_id,
            timestamp: now_millis(),
            error: error.into(),
        }
    }

    pub fn run_cancelled(job_id: Uuid) -> Self {
        Self::RunCancelled {
            job_id,
            timestamp: now_millis(),
        }
    }

    /// Get the job ID from any variant.
    pub fn job_id(&self) -> Uuid {
        match self {
            Self::RunStarted { job_id, .. }
            | Self::ToolCallStart { job_id, .. }
            | Self::StateDelta { job_id, .. }
            | Self::ToolCallEnd { job_id, .. }
            | Self::RunFinished { job_id, .. }
            | Self::RunError { job_id, .. }
            | Self::RunCancelled { job_id, .. } => *job_id,
        }
    }

    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::RunFinished { .. } | Self::RunError { .. } | Self::RunCancelled { .. }
        )
    }
}
