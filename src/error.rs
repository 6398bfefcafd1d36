//! Error types for the devteam scheduler.

use uuid::Uuid;

use crate::tasks::TaskStatus;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Task store errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("Task {id} not found")]
    NotFound { id: Uuid },

    #[error("Task {id} is {from}, cannot transition to {to}")]
    InvalidTransition {
        id: Uuid,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("Task must be assigned to an agent")]
    MissingAssignee,
}

/// Agent resolution and execution errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent {name} not found")]
    NotFound { name: String },

    #[error("Agent {name} failed: {reason}")]
    ExecutionFailed { name: String, reason: String },

    #[error("Agent {name} rejected task: {reason}")]
    Rejected { name: String, reason: String },
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
