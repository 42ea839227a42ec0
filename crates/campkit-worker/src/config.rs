//! Worker configuration.

use campkit_media::TranscodeProfile;

/// Worker pool configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs per worker process.
    ///
    /// File processing inside a job is strictly sequential, so this is also
    /// the ceiling on concurrent transcodes.
    pub max_concurrent_jobs: usize,
    /// How often to scan for pending jobs abandoned by crashed workers
    pub claim_interval_secs: u64,
    /// How long a pending job must sit idle before another worker claims it
    pub claim_min_idle_ms: u64,
    /// How long to wait for in-flight jobs on shutdown
    pub shutdown_timeout_secs: u64,
    /// Per-file transcode timeout, if any
    pub transcode_timeout_secs: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            claim_interval_secs: 30,
            claim_min_idle_ms: 300_000,
            shutdown_timeout_secs: 60,
            transcode_timeout_secs: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_jobs),
            claim_interval_secs: std::env::var("WORKER_CLAIM_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.claim_interval_secs),
            claim_min_idle_ms: std::env::var("WORKER_CLAIM_MIN_IDLE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.claim_min_idle_ms),
            shutdown_timeout_secs: std::env::var("WORKER_SHUTDOWN_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.shutdown_timeout_secs),
            transcode_timeout_secs: std::env::var("WORKER_TRANSCODE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }

    /// Delivery transcode profile with this worker's timeout applied.
    pub fn transcode_profile(&self) -> TranscodeProfile {
        TranscodeProfile {
            timeout_secs: self.transcode_timeout_secs,
            ..TranscodeProfile::default()
        }
    }
}
