//! Job record, log entries, and per-item results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobStatus;
use crate::error::JobError;
use crate::tools::Parameters;

/// Severity of a job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

/// A timestamped line in a job's log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// Outcome of processing a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
    Skipped,
}

/// Per-item result recorded by a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Content path or key the result refers to.
    pub path: String,
    pub status: ResultStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

impl JobResult {
    pub fn new(path: impl Into<String>, status: ResultStatus, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn success(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, ResultStatus::Success, message)
    }

    pub fn error(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, ResultStatus::Error, message)
    }

    pub fn skipped(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(path, ResultStatus::Skipped, message)
    }

    /// Attach a detail map. Non-object values are stored under `"value"`.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = match details {
            serde_json::Value::Object(map) => Some(map),
            serde_json::Value::Null => None,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                Some(map)
            }
        };
        self
    }
}

/// One execution of a tool.
///
/// Clones of a `Job` are the snapshots handed to subscribers and API callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub tool_id: String,
    /// Tool display name captured at creation time.
    pub tool_name: String,
    pub status: JobStatus,
    pub parameters: Parameters,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_items: u64,
    pub processed_items: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub skipped_count: u64,
    pub logs: Vec<LogEntry>,
    pub results: Vec<JobResult>,
    pub error_message: Option<String>,
    /// Bumped on every mutation; orders snapshots of the same job.
    pub revision: u64,
}

impl Job {
    /// Create a new pending job.
    pub fn new(tool_id: impl Into<String>, tool_name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            id: Uuid::new_v4(),
            tool_id: tool_id.into(),
            tool_name: tool_name.into(),
            status: JobStatus::Pending,
            parameters,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            total_items: 0,
            processed_items: 0,
            success_count: 0,
            error_count: 0,
            skipped_count: 0,
            logs: Vec::new(),
            results: Vec::new(),
            error_message: None,
            revision: 0,
        }
    }

    /// Move to a new status, stamping start/completion times.
    pub fn transition_to(&mut self, target: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(target) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                state: self.status.to_string(),
                target: target.to_string(),
            });
        }

        self.status = target;
        match target {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            s if s.is_terminal() => self.completed_at = Some(Utc::now()),
            _ => {}
        }
        self.revision += 1;
        Ok(())
    }

    fn ensure_mutable(&self) -> Result<(), JobError> {
        if self.status.is_terminal() {
            return Err(JobError::Terminal {
                id: self.id,
                state: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Append a log line.
    pub fn add_log(&mut self, level: LogLevel, message: impl Into<String>) -> Result<(), JobError> {
        self.ensure_mutable()?;
        self.logs.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });
        self.revision += 1;
        Ok(())
    }

    /// Record a result and advance the matching counter in one step.
    pub fn add_result(&mut self, result: JobResult) -> Result<(), JobError> {
        self.ensure_mutable()?;
        match result.status {
            ResultStatus::Success => self.success_count += 1,
            ResultStatus::Error => self.error_count += 1,
            ResultStatus::Skipped => self.skipped_count += 1,
        }
        self.processed_items += 1;
        self.results.push(result);
        self.revision += 1;
        Ok(())
    }

    pub fn set_total_items(&mut self, total: u64) -> Result<(), JobError> {
        self.ensure_mutable()?;
        self.total_items = total;
        self.revision += 1;
        Ok(())
    }

    /// `Running → Completed` with a summary log line.
    pub fn complete(&mut self) -> Result<(), JobError> {
        if self.status != JobStatus::Running {
            return self.transition_to(JobStatus::Completed);
        }
        let summary = format!(
            "Job completed. Total: {}, Success: {}, Errors: {}, Skipped: {}",
            self.total_items, self.success_count, self.error_count, self.skipped_count
        );
        self.add_log(LogLevel::Info, summary)?;
        self.transition_to(JobStatus::Completed)
    }

    /// `Running → Failed`, recording the fault message.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        if self.status != JobStatus::Running {
            return self.transition_to(JobStatus::Failed);
        }
        let message = message.into();
        self.add_log(LogLevel::Error, format!("Job failed: {message}"))?;
        self.error_message = Some(message);
        self.transition_to(JobStatus::Failed)
    }

    /// `Running → Cancelled` with a warning log line.
    pub fn cancel(&mut self) -> Result<(), JobError> {
        if self.status != JobStatus::Running {
            return self.transition_to(JobStatus::Cancelled);
        }
        self.add_log(LogLevel::Warn, "Job cancelled by user")?;
        self.transition_to(JobStatus::Cancelled)
    }

    /// Share of items processed, 0–100.
    pub fn progress_percent(&self) -> f64 {
        if self.total_items == 0 {
            return 0.0;
        }
        self.processed_items as f64 / self.total_items as f64 * 100.0
    }

    /// Counter summary used by activity events.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "total_items": self.total_items,
            "processed_items": self.processed_items,
            "success_count": self.success_count,
            "error_count": self.error_count,
            "skipped_count": self.skipped_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_job() -> Job {
        let mut job = Job::new("content-health-check", "Content Health Check", Parameters::new());
        job.transition_to(JobStatus::Running).unwrap();
        job
    }

    fn counters_balanced(job: &Job) -> bool {
        job.processed_items == job.success_count + job.error_count + job.skipped_count
    }

    #[test]
    fn new_job_is_pending() {
        let job = Job::new("asset-report", "Asset Report", Parameters::new());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert_eq!(job.revision, 0);
    }

    #[test]
    fn transitions_stamp_timestamps() {
        let mut job = running_job();
        assert!(job.started_at.is_some());
        job.complete().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn add_result_keeps_counters_balanced() {
        let mut job = running_job();
        for result in [
            JobResult::success("/content/a", "ok"),
            JobResult::error("/content/b", "broken"),
            JobResult::skipped("/content/c", "n/a"),
            JobResult::success("/content/d", "ok"),
        ] {
            job.add_result(result).unwrap();
            assert!(counters_balanced(&job));
        }
        assert_eq!(job.processed_items, 4);
        assert_eq!(job.success_count, 2);
        assert_eq!(job.error_count, 1);
        assert_eq!(job.skipped_count, 1);
        assert_eq!(job.results.len(), 4);
    }

    #[test]
    fn terminal_job_is_immutable() {
        let mut job = running_job();
        job.add_result(JobResult::success("/content/a", "ok")).unwrap();
        job.cancel().unwrap();
        let revision = job.revision;

        assert!(job.add_result(JobResult::success("/content/b", "ok")).is_err());
        assert!(job.add_log(LogLevel::Info, "late").is_err());
        assert!(job.set_total_items(99).is_err());
        assert!(job.transition_to(JobStatus::Running).is_err());
        assert!(job.complete().is_err());

        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.processed_items, 1);
        assert_eq!(job.revision, revision);
    }

    #[test]
    fn fail_records_message_and_log() {
        let mut job = running_job();
        job.fail("disk full").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error_message.as_deref(), Some("disk full"));
        let last = job.logs.last().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert!(last.message.contains("disk full"));
    }

    #[test]
    fn cancel_from_pending_is_rejected() {
        let mut job = Job::new("asset-report", "Asset Report", Parameters::new());
        assert!(job.cancel().is_err());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.logs.is_empty());
    }

    #[test]
    fn complete_writes_summary() {
        let mut job = running_job();
        job.set_total_items(2).unwrap();
        job.add_result(JobResult::success("/a", "ok")).unwrap();
        job.add_result(JobResult::error("/b", "bad")).unwrap();
        job.complete().unwrap();
        let last = job.logs.last().unwrap();
        assert!(last.message.contains("Success: 1"));
        assert!(last.message.contains("Errors: 1"));
    }

    #[test]
    fn progress_percent_handles_zero_total() {
        let mut job = running_job();
        assert_eq!(job.progress_percent(), 0.0);
        job.set_total_items(4).unwrap();
        job.add_result(JobResult::success("/a", "ok")).unwrap();
        assert_eq!(job.progress_percent(), 25.0);
    }

    #[test]
    fn revision_increases_on_every_mutation() {
        let mut job = running_job();
        let r0 = job.revision;
        job.add_log(LogLevel::Debug, "x").unwrap();
        let r1 = job.revision;
        job.add_result(JobResult::success("/a", "ok")).unwrap();
        assert!(r0 < r1 && r1 < job.revision);
    }

    #[test]
    fn result_details_from_object() {
        let result = JobResult::error("/content/a", "missing title")
            .with_details(serde_json::json!({"issues": ["Missing page title"]}));
        let details = result.details.unwrap();
        assert!(details.contains_key("issues"));
    }

    #[test]
    fn job_serializes_snake_case() {
        let job = running_job();
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["processed_items"], 0);
        assert!(json["completed_at"].is_null());
    }
}
