//! Job executor.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use campkit_models::ProcessSubmissionJob;
use campkit_queue::JobQueue;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::{process_submission, ProcessingContext};

/// Pulls jobs from the queue and runs them with bounded concurrency.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    ctx: Arc<ProcessingContext>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(config: WorkerConfig, queue: JobQueue, ctx: Arc<ProcessingContext>) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            ctx,
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically claim jobs abandoned by crashed workers
        let queue_clone = Arc::clone(&self.queue);
        let consumer_name = self.consumer_name.clone();
        let ctx_clone = Arc::clone(&self.ctx);
        let semaphore_clone = Arc::clone(&self.job_semaphore);
        let mut shutdown_rx_claim = self.shutdown.subscribe();
        let claim_interval = Duration::from_secs(self.config.claim_interval_secs);
        let claim_min_idle_ms = self.config.claim_min_idle_ms;

        let claim_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(claim_interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx_claim.changed() => {
                        if *shutdown_rx_claim.borrow() {
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match queue_clone.claim_pending(&consumer_name, claim_min_idle_ms, 5).await {
                            Ok(jobs) if !jobs.is_empty() => {
                                info!("Claimed {} pending jobs", jobs.len());
                                for (message_id, job) in jobs {
                                    let ctx = Arc::clone(&ctx_clone);
                                    let queue = Arc::clone(&queue_clone);
                                    let Ok(permit) = semaphore_clone.clone().acquire_owned().await else {
                                        break;
                                    };

                                    tokio::spawn(async move {
                                        let _permit = permit;
                                        Self::execute_job(ctx, queue, message_id, job).await;
                                    });
                                }
                            }
                            Ok(_) => {}
                            Err(e) => {
                                warn!("Failed to claim pending jobs: {}", e);
                            }
                        }
                    }
                }
            }
        });

        // Main job consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_jobs() => {
                    if let Err(e) = result {
                        error!("Error consuming jobs: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(
            Duration::from_secs(self.config.shutdown_timeout_secs),
            self.wait_for_jobs(),
        )
        .await;

        info!("Job executor stopped");
        Ok(())
    }

    /// Consume and dispatch jobs from the queue.
    async fn consume_jobs(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let jobs = self
            .queue
            .consume(
                &self.consumer_name,
                1000, // Block for 1 second
                available,
            )
            .await?;

        if jobs.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} jobs from queue", jobs.len());

        for (message_id, job) in jobs {
            let ctx = Arc::clone(&self.ctx);
            let queue = Arc::clone(&self.queue);
            let permit = self
                .job_semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| WorkerError::job_failed("Semaphore closed"))?;

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_job(ctx, queue, message_id, job).await;
            });
        }

        Ok(())
    }

    /// Execute a single job with retry and DLQ handling.
    async fn execute_job(
        ctx: Arc<ProcessingContext>,
        queue: Arc<JobQueue>,
        message_id: String,
        job: ProcessSubmissionJob,
    ) {
        let job_id = job.job_id.clone();
        info!("Executing job {}", job_id);

        match process_submission(&ctx, &job).await {
            Ok(()) => {
                info!("Job {} completed successfully", job_id);
                if let Err(e) = queue.ack(&message_id).await {
                    error!("Failed to ack job {}: {}", job_id, e);
                }
            }
            Err(e) => {
                error!("Job {} failed: {}", job_id, e);

                let attempts = queue.increment_attempts(&message_id).await.unwrap_or(u32::MAX);
                let max_attempts = queue.max_attempts();

                if !e.is_retryable() || attempts >= max_attempts {
                    if e.is_retryable() {
                        warn!(
                            "Job {} exhausted {} attempts, moving to DLQ",
                            job_id, max_attempts
                        );
                    } else {
                        warn!("Job {} failed permanently, moving to DLQ: {}", job_id, e);
                    }

                    cleanup_local_files(&job).await;

                    if let Err(dlq_err) = queue.dlq(&message_id, &job, &e.to_string()).await {
                        error!("Failed to move job {} to DLQ: {}", job_id, dlq_err);
                    }
                } else {
                    info!(
                        "Job {} will be retried (attempt {}/{})",
                        job_id, attempts, max_attempts
                    );
                    // Left unacked; redelivered via the pending-claim scan
                }
            }
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

/// Reclaim local disk after a terminal failure.
async fn cleanup_local_files(job: &ProcessSubmissionJob) {
    for path in job.input_paths() {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Removed input file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove input file: {}", e),
        }
    }
    // Partially transcoded outputs may exist for the file that failed
    for file in &job.files {
        if let Err(e) = tokio::fs::remove_file(&file.output_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %file.output_path.display(), "Failed to remove output file: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campkit_models::{SubmissionFile, SubmissionId};

    #[tokio::test]
    async fn cleanup_removes_all_local_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mov");
        let output = dir.path().join("out.mp4");
        std::fs::write(&input, b"raw").unwrap();
        std::fs::write(&output, b"partial").unwrap();

        let job = ProcessSubmissionJob::new("user_1", SubmissionId::new(), "camp_1", "camp_1/drafts")
            .with_files(vec![SubmissionFile {
                input_path: input.clone(),
                output_path: output.clone(),
                file_name: "out.mp4".to_string(),
            }]);

        cleanup_local_files(&job).await;

        assert!(!input.exists());
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn cleanup_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let job = ProcessSubmissionJob::new("user_1", SubmissionId::new(), "camp_1", "camp_1/drafts")
            .with_files(vec![SubmissionFile {
                input_path: dir.path().join("never_written.mov"),
                output_path: dir.path().join("never_written.mp4"),
                file_name: "never_written.mp4".to_string(),
            }]);

        cleanup_local_files(&job).await;
    }
}
