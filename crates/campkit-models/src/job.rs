//! Queue job payloads.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::submission::SubmissionId;

/// Unique identifier for a queued processing run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One raw uploaded file inside a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SubmissionFile {
    /// Raw upload on local temporary storage
    pub input_path: PathBuf,
    /// Where the transcoded output should be written
    pub output_path: PathBuf,
    /// Display name, also used as the object storage destination name
    pub file_name: String,
}

/// Job to process one creator's batch of uploaded files for one submission.
///
/// Created by the upload-accepting controller, consumed by exactly one worker
/// attempt, and retried as a whole unit on failure.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessSubmissionJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Creator user ID
    pub user_id: String,
    /// Submission being fulfilled
    pub submission_id: SubmissionId,
    /// Campaign the submission belongs to
    pub campaign_id: String,
    /// Object storage folder for the uploads
    pub folder: String,
    /// Creator-provided caption
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Admin user IDs to copy on review notifications
    #[serde(default)]
    pub admins: Vec<String>,
    /// Files to transcode and upload, processed in order
    pub files: Vec<SubmissionFile>,
    /// When the job was created
    pub created_at: DateTime<Utc>,
}

impl ProcessSubmissionJob {
    /// Create a new job.
    pub fn new(
        user_id: impl Into<String>,
        submission_id: SubmissionId,
        campaign_id: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            user_id: user_id.into(),
            submission_id,
            campaign_id: campaign_id.into(),
            folder: folder.into(),
            caption: None,
            admins: Vec::new(),
            files: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the caption.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    /// Set the admin list.
    pub fn with_admins(mut self, admins: Vec<String>) -> Self {
        self.admins = admins;
        self
    }

    /// Set the file list.
    pub fn with_files(mut self, files: Vec<SubmissionFile>) -> Self {
        self.files = files;
        self
    }

    /// Local input paths, for cleanup after terminal failure.
    pub fn input_paths(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(|f| f.input_path.as_path())
    }
}
