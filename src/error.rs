//! Error types for the alarm core and its collaborators.

use thiserror::Error;

/// A time setpoint outside `00:00..=23:59`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid setpoint {hour:02}:{minute:02}")]
pub struct InvalidSetpoint {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt alarm record: {0}")]
    Corrupt(#[from] InvalidSetpoint),
}

#[derive(Debug, Error)]
pub enum TimerError {
    #[error("no async runtime available to arm the timer")]
    NoRuntime,

    #[error("timer event channel closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to spawn interrupt command `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while applying a mutation on the writer task.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    InvalidSetpoint(#[from] InvalidSetpoint),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("timer error: {0}")]
    Timer(#[from] TimerError),
}

/// Failure to enqueue a mutation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    InvalidSetpoint(#[from] InvalidSetpoint),

    #[error("mutation queue closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("alarm writer stopped")]
    Closed,
}
