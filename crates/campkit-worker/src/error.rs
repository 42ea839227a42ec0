//! Worker error types.

use thiserror::Error;

use campkit_media::MediaError;
use campkit_platform::PlatformError;
use campkit_queue::QueueError;
use campkit_storage::StorageError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Data inconsistency the pipeline cannot resolve by retrying, e.g.
    /// "Submission not found" or "UGC Credits is not assigned to this creator".
    #[error("{0}")]
    Precondition(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Whether re-running the job can reasonably succeed.
    ///
    /// Precondition failures and missing input files will fail the same way
    /// on every attempt; those go straight to the DLQ.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Precondition(_) => false,
            WorkerError::Media(MediaError::FileNotFound(_)) => false,
            WorkerError::Platform(e) => e.is_retryable(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn precondition_is_not_retryable() {
        let err = WorkerError::precondition("Submission not found");
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "Submission not found");
    }

    #[test]
    fn missing_input_is_not_retryable() {
        let err = WorkerError::Media(MediaError::FileNotFound(PathBuf::from("/tmp/gone.mov")));
        assert!(!err.is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        let err = WorkerError::job_failed("upload interrupted");
        assert!(err.is_retryable());
    }
}
