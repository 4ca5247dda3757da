//! Error types for the carga harness
//!
//! A single crate-level error enum with typed variants per failure class.
//! Per-request faults (timeouts, bad status codes, unparseable bodies) are
//! NOT errors at this level: they convert to failed `RequestOutcome` values
//! and never abort a batch. `CargaError` covers harness-level failures only.

use thiserror::Error;

/// Harness-level errors with detailed context for diagnosis
#[derive(Debug, Error)]
pub enum CargaError {
    /// Worker process could not be spawned
    #[error("Failed to launch worker: {reason}")]
    LaunchFailed {
        /// Description of the spawn failure
        reason: String,
    },

    /// Worker never passed its health check within the readiness window
    #[error("Worker not ready at {url} after {waited_secs}s")]
    WorkerNotReady {
        /// Base URL that was polled
        url: String,
        /// Seconds spent polling before giving up
        waited_secs: u64,
    },

    /// Invalid harness configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Filesystem I/O failure
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O failure
        message: String,
    },

    /// Report serialization failed
    #[error("Format error: {reason}")]
    FormatError {
        /// Description of the encoding failure
        reason: String,
    },
}

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, CargaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_failed_display() {
        let err = CargaError::LaunchFailed {
            reason: "binary not found".to_string(),
        };
        assert_eq!(err.to_string(), "Failed to launch worker: binary not found");
    }

    #[test]
    fn test_worker_not_ready_display() {
        let err = CargaError::WorkerNotReady {
            url: "http://127.0.0.1:31000".to_string(),
            waited_secs: 60,
        };
        assert!(err.to_string().contains("http://127.0.0.1:31000"));
        assert!(err.to_string().contains("60s"));
    }

    #[test]
    fn test_invalid_configuration_display() {
        let err = CargaError::InvalidConfiguration("empty ladder".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: empty ladder");
    }

    #[test]
    fn test_io_error_display() {
        let err = CargaError::IoError {
            message: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "I/O error: disk full");
    }
}
