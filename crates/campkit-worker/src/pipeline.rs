//! Transcode-and-upload pipeline.
//!
//! Runs one job end to end: load the submission, transcode and upload each
//! file in order, persist video records, stamp the caption, then hand off
//! to the completion state machine. Progress events stream to the creator's
//! live connection when they have one.

use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use campkit_media::TranscodeProfile;
use campkit_models::{
    CreatorEvent, Deliverable, DeliverableKind, DeliverableStatus, ProcessSubmissionJob,
    SubmissionFile,
};
use campkit_platform::{
    CampaignStore, DeliverableStore, PlatformClient, StatusFilter, SubmissionStore,
};
use campkit_queue::ConnectionRegistry;
use campkit_storage::{content_type_for, R2Client, UploadProgress};

use crate::completion;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Percent-complete callback for a transcode.
pub type TranscodeProgress = Box<dyn Fn(u8) + Send + Sync + 'static>;

/// Transcodes one file to the delivery profile.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        on_progress: TranscodeProgress,
    ) -> WorkerResult<()>;
}

/// Uploads one file to object storage, returning its public URL.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        folder: &str,
        on_progress: Option<UploadProgress>,
        known_size: Option<u64>,
    ) -> WorkerResult<String>;
}

/// FFmpeg-backed transcoder with a fixed profile.
pub struct FfmpegTranscoder {
    profile: TranscodeProfile,
}

impl FfmpegTranscoder {
    pub fn new(profile: TranscodeProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        on_progress: TranscodeProgress,
    ) -> WorkerResult<()> {
        campkit_media::transcode(input, output, &self.profile, on_progress).await?;
        Ok(())
    }
}

/// R2-backed uploader.
pub struct R2Uploader {
    client: R2Client,
}

impl R2Uploader {
    pub fn new(client: R2Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Uploader for R2Uploader {
    async fn upload(
        &self,
        path: &Path,
        file_name: &str,
        folder: &str,
        on_progress: Option<UploadProgress>,
        known_size: Option<u64>,
    ) -> WorkerResult<String> {
        let url = self
            .client
            .upload(path, file_name, folder, on_progress, known_size)
            .await?;
        Ok(url)
    }
}

/// Everything a job needs to run.
pub struct ProcessingContext {
    pub submissions: Arc<dyn SubmissionStore>,
    pub deliverables: Arc<dyn DeliverableStore>,
    pub campaigns: Arc<dyn CampaignStore>,
    pub transcoder: Arc<dyn Transcoder>,
    pub uploader: Arc<dyn Uploader>,
    pub registry: Arc<dyn ConnectionRegistry>,
}

impl ProcessingContext {
    /// Wire the production implementations.
    pub fn production(
        config: &WorkerConfig,
        platform: PlatformClient,
        storage: R2Client,
        registry: impl ConnectionRegistry + 'static,
    ) -> Self {
        let platform = Arc::new(platform);
        Self {
            submissions: platform.clone(),
            deliverables: platform.clone(),
            campaigns: platform,
            transcoder: Arc::new(FfmpegTranscoder::new(config.transcode_profile())),
            uploader: Arc::new(R2Uploader::new(storage)),
            registry: Arc::new(registry),
        }
    }

    /// Open the event channel to the creator's live connection.
    ///
    /// Returns a sink that drops events when the creator is offline, plus
    /// the forwarding task to await once the sink is dropped. Lookup
    /// failures degrade to offline; they never fail the job.
    async fn open_event_channel(&self, user_id: &str) -> (EventSink, Option<JoinHandle<()>>) {
        match self.registry.get(user_id).await {
            Ok(Some(conn)) => {
                let (tx, mut rx) = mpsc::unbounded_channel::<CreatorEvent>();
                let handle = tokio::spawn(async move {
                    while let Some(event) = rx.recv().await {
                        if let Err(e) = conn.emit(&event).await {
                            debug!("Failed to emit creator event: {}", e);
                        }
                    }
                });
                (EventSink { tx: Some(tx) }, Some(handle))
            }
            Ok(None) => (EventSink { tx: None }, None),
            Err(e) => {
                warn!(user = %user_id, "Connection lookup failed, processing without events: {}", e);
                (EventSink { tx: None }, None)
            }
        }
    }
}

/// Sends creator events when a connection exists, drops them otherwise.
#[derive(Clone)]
struct EventSink {
    tx: Option<mpsc::UnboundedSender<CreatorEvent>>,
}

impl EventSink {
    fn send(&self, event: CreatorEvent) {
        if let Some(tx) = &self.tx {
            tx.send(event).ok();
        }
    }
}

/// Process one job: every file in order, then caption/date, then the
/// completion state machine.
pub async fn process_submission(
    ctx: &ProcessingContext,
    job: &ProcessSubmissionJob,
) -> WorkerResult<()> {
    let submission = ctx
        .submissions
        .get(&job.submission_id)
        .await?
        .ok_or_else(|| WorkerError::precondition("Submission not found"))?;

    info!(
        job_id = %job.job_id,
        submission = %submission.id,
        submission_type = %submission.submission_type,
        files = job.files.len(),
        "Processing submission job"
    );

    let (events, forwarder) = ctx.open_event_channel(&job.user_id).await;

    // One gate query per job, not per file: if review flagged any video for
    // revision, this pass uploads replacements without inserting new rows
    // (the review-acceptance flow rewires the flagged records).
    let revisions_pending = ctx
        .deliverables
        .count(
            &job.user_id,
            &job.campaign_id,
            DeliverableKind::Video,
            StatusFilter::Is(DeliverableStatus::RevisionRequested),
        )
        .await?
        > 0;
    if revisions_pending {
        info!(
            job_id = %job.job_id,
            "Revision-requested videos exist, skipping new video records"
        );
    }

    for file in &job.files {
        process_file(ctx, job, file, revisions_pending, &events).await?;
    }

    // Caption and date are stamped even when no rows were inserted; the
    // creator did submit, whatever the revision gate decided.
    ctx.submissions
        .set_caption_and_date(&job.submission_id, job.caption.as_deref(), Utc::now())
        .await?;

    let wrote_status = completion::run(
        ctx.submissions.as_ref(),
        ctx.deliverables.as_ref(),
        ctx.campaigns.as_ref(),
        &submission,
    )
    .await?;

    if wrote_status {
        events.send(CreatorEvent::UpdateSubmission);
    }

    drop(events);
    if let Some(handle) = forwarder {
        handle.await.ok();
    }

    info!(job_id = %job.job_id, "Job complete");
    Ok(())
}

/// Transcode, upload, and record one file.
async fn process_file(
    ctx: &ProcessingContext,
    job: &ProcessSubmissionJob,
    file: &SubmissionFile,
    revisions_pending: bool,
    events: &EventSink,
) -> WorkerResult<()> {
    let input = file.input_path.as_path();
    let output = file.output_path.as_path();

    debug!(file = %file.file_name, "Transcoding");
    {
        let events = events.clone();
        let file_name = file.file_name.clone();
        let last_sent = Arc::new(AtomicU8::new(u8::MAX));
        ctx.transcoder
            .transcode(
                input,
                output,
                Box::new(move |percent| {
                    if last_sent.swap(percent, Ordering::Relaxed) != percent {
                        events.send(CreatorEvent::processing(file_name.clone(), percent));
                    }
                }),
            )
            .await?;
    }

    let size = tokio::fs::metadata(output).await?.len();
    events.send(CreatorEvent::compression_start(
        size,
        content_type_for(&file.file_name),
    ));

    debug!(file = %file.file_name, size, "Uploading");
    let url = {
        let events = events.clone();
        let file_name = file.file_name.clone();
        let last_sent = Arc::new(AtomicU8::new(u8::MAX));
        ctx.uploader
            .upload(
                output,
                &file.file_name,
                &job.folder,
                Some(Box::new(move |done, total| {
                    let percent = if total == 0 {
                        100
                    } else {
                        ((done.min(total) * 100) / total) as u8
                    };
                    if last_sent.swap(percent, Ordering::Relaxed) != percent {
                        events.send(CreatorEvent::uploading(file_name.clone(), percent));
                    }
                })),
                Some(size),
            )
            .await?
    };

    if !revisions_pending {
        let deliverable = Deliverable::new(
            DeliverableKind::Video,
            url,
            job.submission_id.clone(),
            &job.campaign_id,
            &job.user_id,
        );
        ctx.deliverables.insert(&deliverable).await?;
    }

    // Reclaim local disk; failures here must not fail an uploaded file.
    if let Err(e) = tokio::fs::remove_file(input).await {
        warn!(path = %input.display(), "Failed to remove input file: {}", e);
    }
    if let Err(e) = tokio::fs::remove_file(output).await {
        warn!(path = %output.display(), "Failed to remove transcoded file: {}", e);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use campkit_models::{
        CampaignSettings, Submission, SubmissionId, SubmissionStatus, SubmissionType,
    };
    use campkit_platform::MemoryStore;
    use campkit_queue::{Connection, ConnectionHandle, QueueResult};

    /// Transcoder that writes a small output file and reports two progress ticks.
    struct FakeTranscoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(
            &self,
            _input: &Path,
            output: &Path,
            on_progress: TranscodeProgress,
        ) -> WorkerResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(output, b"transcoded").await?;
            on_progress(50);
            on_progress(100);
            Ok(())
        }
    }

    struct FakeUploader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Uploader for FakeUploader {
        async fn upload(
            &self,
            _path: &Path,
            file_name: &str,
            folder: &str,
            on_progress: Option<UploadProgress>,
            known_size: Option<u64>,
        ) -> WorkerResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let total = known_size.unwrap_or(10);
            if let Some(cb) = on_progress {
                cb(total, total);
            }
            Ok(format!("https://cdn.example.com/{}/{}", folder, file_name))
        }
    }

    /// Registry whose single connection records every emitted event.
    struct RecordingRegistry {
        events: Arc<Mutex<Vec<CreatorEvent>>>,
    }

    struct RecordingConnection {
        events: Arc<Mutex<Vec<CreatorEvent>>>,
    }

    #[async_trait]
    impl Connection for RecordingConnection {
        async fn emit(&self, event: &CreatorEvent) -> QueueResult<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl ConnectionRegistry for RecordingRegistry {
        async fn get(&self, _user_id: &str) -> QueueResult<Option<ConnectionHandle>> {
            Ok(Some(Box::new(RecordingConnection {
                events: Arc::clone(&self.events),
            })))
        }
    }

    /// Registry that always reports the creator offline.
    struct OfflineRegistry;

    #[async_trait]
    impl ConnectionRegistry for OfflineRegistry {
        async fn get(&self, _user_id: &str) -> QueueResult<Option<ConnectionHandle>> {
            Ok(None)
        }
    }

    struct Harness {
        ctx: ProcessingContext,
        store: MemoryStore,
        transcodes: Arc<FakeTranscoder>,
        uploads: Arc<FakeUploader>,
        events: Arc<Mutex<Vec<CreatorEvent>>>,
    }

    fn harness(online: bool) -> Harness {
        let store = MemoryStore::new();
        let transcodes = Arc::new(FakeTranscoder {
            calls: AtomicUsize::new(0),
        });
        let uploads = Arc::new(FakeUploader {
            calls: AtomicUsize::new(0),
        });
        let events = Arc::new(Mutex::new(Vec::new()));

        let registry: Arc<dyn ConnectionRegistry> = if online {
            Arc::new(RecordingRegistry {
                events: Arc::clone(&events),
            })
        } else {
            Arc::new(OfflineRegistry)
        };

        let ctx = ProcessingContext {
            submissions: Arc::new(store.clone()),
            deliverables: Arc::new(store.clone()),
            campaigns: Arc::new(store.clone()),
            transcoder: transcodes.clone(),
            uploader: uploads.clone(),
            registry,
        };

        Harness {
            ctx,
            store,
            transcodes,
            uploads,
            events,
        }
    }

    fn job_with_files(dir: &Path, submission_id: SubmissionId, n: usize) -> ProcessSubmissionJob {
        let files = (0..n)
            .map(|i| {
                let input = dir.join(format!("in_{}.mov", i));
                std::fs::write(&input, b"raw upload").unwrap();
                SubmissionFile {
                    input_path: input,
                    output_path: dir.join(format!("out_{}.mp4", i)),
                    file_name: format!("out_{}.mp4", i),
                }
            })
            .collect();

        ProcessSubmissionJob::new("user_1", submission_id, "camp_1", "camp_1/drafts")
            .with_caption("first cut")
            .with_files(files)
    }

    fn ugc_campaign() -> CampaignSettings {
        CampaignSettings {
            campaign_id: "camp_1".to_string(),
            raw_footage: false,
            photos: false,
            campaign_credits: None,
        }
    }

    #[tokio::test]
    async fn full_success_runs_every_step_once_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(true);

        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft)
            .with_status(SubmissionStatus::NotStarted);
        h.store.insert_submission(submission.clone());
        h.store.insert_campaign(ugc_campaign());

        let job = job_with_files(dir.path(), submission.id.clone(), 3);
        process_submission(&h.ctx, &job).await.unwrap();

        assert_eq!(h.transcodes.calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.uploads.calls.load(Ordering::SeqCst), 3);
        assert_eq!(h.store.deliverable_count(), 3);

        let stored = h.store.submission(&submission.id).unwrap();
        assert_eq!(stored.caption.as_deref(), Some("first cut"));
        assert!(stored.submission_date.is_some());
        assert_eq!(stored.status, SubmissionStatus::PendingReview);

        // Local files are gone after a successful pass.
        for file in &job.files {
            assert!(!file.input_path.exists());
            assert!(!file.output_path.exists());
        }

        let events = h.events.lock().unwrap();
        let names: Vec<&str> = events.iter().map(|e| e.event_name()).collect();
        assert!(names.contains(&"progress"));
        assert_eq!(names.last(), Some(&"updateSubmission"));
        assert!(events
            .iter()
            .any(|e| matches!(e, CreatorEvent::CompressionStart(_))));
    }

    #[tokio::test]
    async fn pending_revisions_suppress_inserts_but_not_caption() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(false);

        let submission = Submission::new("camp_1", "user_1", SubmissionType::FinalDraft)
            .with_status(SubmissionStatus::ChangesRequired);
        h.store.insert_submission(submission.clone());
        h.store.insert_campaign(ugc_campaign());

        let mut flagged = Deliverable::new(
            DeliverableKind::Video,
            "https://cdn.example.com/old.mp4",
            submission.id.clone(),
            "camp_1",
            "user_1",
        );
        flagged.status = DeliverableStatus::RevisionRequested;
        h.store.push_deliverable(flagged);

        let job = job_with_files(dir.path(), submission.id.clone(), 2);
        process_submission(&h.ctx, &job).await.unwrap();

        assert_eq!(h.uploads.calls.load(Ordering::SeqCst), 2);
        // Only the pre-existing flagged row remains; no new inserts.
        assert_eq!(h.store.deliverable_count(), 1);

        let stored = h.store.submission(&submission.id).unwrap();
        assert_eq!(stored.caption.as_deref(), Some("first cut"));
        // Outstanding video revision keeps the final draft incomplete.
        assert_eq!(stored.status, SubmissionStatus::ChangesRequired);
    }

    #[tokio::test]
    async fn missing_submission_fails_before_any_transcode() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(false);

        let job = job_with_files(dir.path(), SubmissionId::new(), 1);
        let err = process_submission(&h.ctx, &job).await.unwrap_err();

        assert!(matches!(err, WorkerError::Precondition(_)));
        assert!(!err.is_retryable());
        assert_eq!(h.transcodes.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.uploads.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn offline_creator_still_processes() {
        let dir = tempfile::tempdir().unwrap();
        let h = harness(false);

        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft)
            .with_status(SubmissionStatus::NotStarted);
        h.store.insert_submission(submission.clone());
        h.store.insert_campaign(ugc_campaign());

        let job = job_with_files(dir.path(), submission.id.clone(), 1);
        process_submission(&h.ctx, &job).await.unwrap();

        assert_eq!(h.store.deliverable_count(), 1);
        assert_eq!(
            h.store.submission(&submission.id).unwrap().status,
            SubmissionStatus::PendingReview
        );
    }
}
