//! Error types for the appquitter-core library.
//!
//! Termination failures are not errors: they are reported as
//! [`AttemptState`](crate::domain::AttemptState) values. This type covers the
//! infrastructure around them (persistence, configuration, the coordinator).

use thiserror::Error;

/// Result type alias for appquitter operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing the whitelist or running attempts.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A process identity failed validation.
    #[error("Invalid process identity: {0}")]
    InvalidIdentity(String),

    /// The coordination task is no longer running.
    #[error("Coordinator stopped")]
    CoordinatorStopped,

    /// An attempt task ended without producing a report.
    #[error("Attempt aborted: {0}")]
    AttemptAborted(String),
}

/// Errors reported by a process terminator when signalling a process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KillError {
    /// The specified process was not found
    #[error("Process with PID {0} not found")]
    ProcessNotFound(u32),

    /// Permission denied to signal the process
    #[error("Permission denied to terminate process {0}")]
    PermissionDenied(u32),

    /// The signal could not be delivered for another reason
    #[error("Failed to signal process {0}: {1}")]
    SignalFailed(u32, String),
}
