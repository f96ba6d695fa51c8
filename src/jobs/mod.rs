//! Job records, storage, live broadcast, and execution.

pub mod activity;
pub mod broadcast;
pub mod engine;
pub mod model;
pub mod state;
pub mod store;

pub use activity::JobEvent;
pub use broadcast::{EventBroadcaster, ProgressEmitter};
pub use engine::ExecutionEngine;
pub use model::{Job, JobResult, LogEntry, LogLevel, ResultStatus};
pub use state::JobStatus;
pub use store::{JobHandle, JobStore};
