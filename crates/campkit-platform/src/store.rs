//! Store traits: the persistence boundary the pipeline depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use campkit_models::{
    CampaignSettings, Deliverable, DeliverableKind, DeliverableStatus, ShortlistedCreator,
    Submission, SubmissionId, SubmissionStatus,
};

use crate::error::PlatformResult;

/// Status predicate for deliverable counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// Count every row
    Any,
    /// Count rows with exactly this status
    Is(DeliverableStatus),
    /// Count rows with any status but this one
    IsNot(DeliverableStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: DeliverableStatus) -> bool {
        match self {
            StatusFilter::Any => true,
            StatusFilter::Is(s) => status == *s,
            StatusFilter::IsNot(s) => status != *s,
        }
    }
}

/// Submission reads and the two writes the pipeline performs.
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Fetch a submission by ID.
    async fn get(&self, id: &SubmissionId) -> PlatformResult<Option<Submission>>;

    /// Persist the creator's caption and stamp the submission date.
    async fn set_caption_and_date(
        &self,
        id: &SubmissionId,
        caption: Option<&str>,
        submission_date: DateTime<Utc>,
    ) -> PlatformResult<()>;

    /// Compare-and-swap status write.
    ///
    /// Writes `next` (and optionally `submission_date`) only while the stored
    /// status still equals `expected`. Returns false on conflict so the
    /// caller can re-read and recompute instead of clobbering a concurrent
    /// review-side transition.
    async fn update_status_if(
        &self,
        id: &SubmissionId,
        expected: SubmissionStatus,
        next: SubmissionStatus,
        submission_date: Option<DateTime<Utc>>,
    ) -> PlatformResult<bool>;
}

/// Deliverable inserts and the count queries the completion logic runs.
#[async_trait]
pub trait DeliverableStore: Send + Sync {
    /// Insert a new deliverable row. The pipeline never updates existing rows.
    async fn insert(&self, deliverable: &Deliverable) -> PlatformResult<()>;

    /// Count deliverables of one kind for a (user, campaign) pair.
    async fn count(
        &self,
        user_id: &str,
        campaign_id: &str,
        kind: DeliverableKind,
        filter: StatusFilter,
    ) -> PlatformResult<u64>;
}

/// Read-only campaign configuration.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Campaign deliverable requirements and credit pool.
    async fn settings(&self, campaign_id: &str) -> PlatformResult<Option<CampaignSettings>>;

    /// The creator's shortlist entry on this campaign, if any.
    async fn shortlisted(
        &self,
        user_id: &str,
        campaign_id: &str,
    ) -> PlatformResult<Option<ShortlistedCreator>>;
}
