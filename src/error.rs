//! Error types for Admin Tools.

use uuid::Uuid;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Tool lookup, validation, and execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {id} not found")]
    NotFound { id: String },

    #[error("Tool {id} is already registered")]
    AlreadyRegistered { id: String },

    #[error("Invalid parameters for tool {id}: {reason}")]
    InvalidParameters { id: String, reason: String },

    /// Plain fault raised from inside a tool body.
    #[error("{0}")]
    Failed(String),

    /// A job write from inside a tool body was rejected.
    #[error(transparent)]
    Job(#[from] JobError),
}

impl ToolError {
    /// Shorthand for a plain fault raised by a tool body.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Job-related errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} already in state {state}, cannot transition to {target}")]
    InvalidTransition {
        id: Uuid,
        state: String,
        target: String,
    },

    #[error("Job {id} is {state} and can no longer be modified")]
    Terminal { id: Uuid, state: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
