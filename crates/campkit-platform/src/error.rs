//! Platform API error types.

use thiserror::Error;

pub type PlatformResult<T> = Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlatformError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Whether a retry can reasonably succeed.
    ///
    /// Network errors, 429, and 5xx are retryable; other 4xx responses and
    /// local errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::Network(_) | PlatformError::RateLimited { .. } => true,
            PlatformError::RequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Server-requested retry delay, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            PlatformError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}
