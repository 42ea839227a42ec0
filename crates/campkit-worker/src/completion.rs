//! Submission completion state machine.
//!
//! After a job's files are processed, this decides whether the submission
//! is complete (everything the campaign requires has been delivered) and
//! moves its status accordingly. The decision rules differ between
//! FIRST_DRAFT (absolute counts) and FINAL_DRAFT (outstanding revisions),
//! and between the v4 and legacy workflow generations.

use chrono::Utc;
use tracing::{debug, info, warn};

use campkit_models::{
    CampaignSettings, DeliverableKind, DeliverableStatus, Submission, SubmissionStatus,
    SubmissionType, SubmissionVersion,
};
use campkit_platform::{CampaignStore, DeliverableStore, StatusFilter, SubmissionStore};

use crate::error::{WorkerError, WorkerResult};

/// Attempts at the compare-and-swap status write before giving up.
/// A conflict means a review controller moved the submission mid-run;
/// giving up leaves their write in place, which is the safe outcome.
const MAX_CAS_ATTEMPTS: u32 = 3;

/// Deliverable counts feeding the completion predicate.
///
/// Only the fields relevant to the submission type are populated by
/// [`run`]; FIRST_DRAFT looks at absolute counts, FINAL_DRAFT at
/// outstanding revision requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeliverableTally {
    /// Videos not currently flagged for revision
    pub videos: u64,
    /// Raw footage items, any status
    pub raw_footage: u64,
    /// Photos, any status
    pub photos: u64,
    /// Videos flagged REVISION_REQUESTED
    pub videos_revision_requested: u64,
    /// Raw footage flagged REVISION_REQUESTED
    pub raw_footage_revision_requested: u64,
    /// Photos flagged REVISION_REQUESTED
    pub photos_revision_requested: u64,
}

/// Whether everything the campaign requires has been delivered.
///
/// For credit-based campaigns the creator must deliver exactly their
/// contracted video count; `ugc_videos` unset on such a campaign is a data
/// inconsistency and fails the job.
pub fn all_deliverables_sent(
    submission_type: SubmissionType,
    settings: &CampaignSettings,
    ugc_videos: Option<u32>,
    tally: &DeliverableTally,
) -> WorkerResult<bool> {
    match submission_type {
        SubmissionType::FirstDraft => {
            let has_videos = if settings.is_ugc() {
                tally.videos > 0
            } else {
                let contracted = ugc_videos.filter(|n| *n > 0).ok_or_else(|| {
                    WorkerError::precondition("UGC Credits is not assigned to this creator")
                })?;
                tally.videos == u64::from(contracted)
            };
            let has_raw_footage = !settings.raw_footage || tally.raw_footage > 0;
            let has_photos = !settings.photos || tally.photos > 0;
            Ok(has_videos && has_raw_footage && has_photos)
        }
        SubmissionType::FinalDraft => {
            let has_videos = tally.videos_revision_requested == 0;
            let has_raw_footage = !settings.raw_footage || tally.raw_footage_revision_requested == 0;
            let has_photos = !settings.photos || tally.photos_revision_requested == 0;
            Ok(has_videos && has_raw_footage && has_photos)
        }
        // Agreement forms and postings never reach the completion predicate.
        _ => Ok(false),
    }
}

/// Next status for the submission, or `None` for no transition.
/// The `bool` is whether to stamp `submissionDate` alongside the write.
pub fn next_status(
    version: SubmissionVersion,
    submission_type: SubmissionType,
    current: SubmissionStatus,
    all_sent: bool,
) -> Option<(SubmissionStatus, bool)> {
    if version.is_v4() {
        // v4 controllers gate entry into IN_PROGRESS before the pipeline
        // runs, so a processing pass always advances it; any other status
        // was set by a later workflow stage and is never downgraded.
        return match current {
            SubmissionStatus::InProgress => Some((SubmissionStatus::PendingReview, true)),
            _ => None,
        };
    }

    if current == SubmissionStatus::PendingReview {
        return None;
    }
    if all_sent {
        Some((SubmissionStatus::PendingReview, true))
    } else if submission_type == SubmissionType::FirstDraft {
        Some((SubmissionStatus::InProgress, false))
    } else {
        Some((SubmissionStatus::ChangesRequired, false))
    }
}

/// Evaluate the state machine for `submission` and persist the resulting
/// status. Returns whether a status write happened.
///
/// The current status is re-read on every attempt and written with a
/// compare-and-swap so a concurrent review-side transition is never
/// clobbered; on conflict the decision is recomputed against the fresh
/// status.
pub async fn run(
    submissions: &dyn SubmissionStore,
    deliverables: &dyn DeliverableStore,
    campaigns: &dyn CampaignStore,
    submission: &Submission,
) -> WorkerResult<bool> {
    if !submission.submission_type.is_draft() {
        debug!(
            submission = %submission.id,
            submission_type = %submission.submission_type,
            "Submission type has no completion transition"
        );
        return Ok(false);
    }

    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let current = submissions
            .get(&submission.id)
            .await?
            .ok_or_else(|| WorkerError::precondition("Submission not found"))?;

        let all_sent = if current.submission_version.is_v4() {
            // v4 transitions regardless of the predicate; skip the counts.
            false
        } else if current.status == SubmissionStatus::PendingReview {
            false
        } else {
            let Some(settings) = campaigns.settings(&submission.campaign_id).await? else {
                warn!(
                    submission = %submission.id,
                    campaign = %submission.campaign_id,
                    "Campaign settings missing, leaving status unchanged"
                );
                return Ok(false);
            };
            let ugc_videos = if settings.is_ugc() {
                None
            } else {
                campaigns
                    .shortlisted(&submission.user_id, &submission.campaign_id)
                    .await?
                    .and_then(|c| c.ugc_videos)
            };
            let tally =
                tally_deliverables(deliverables, submission, &settings).await?;
            all_deliverables_sent(submission.submission_type, &settings, ugc_videos, &tally)?
        };

        let Some((next, stamp_date)) = next_status(
            current.submission_version,
            current.submission_type,
            current.status,
            all_sent,
        ) else {
            debug!(
                submission = %submission.id,
                status = %current.status,
                "No status transition"
            );
            return Ok(false);
        };

        let submission_date = stamp_date.then(Utc::now);
        if submissions
            .update_status_if(&submission.id, current.status, next, submission_date)
            .await?
        {
            info!(
                submission = %submission.id,
                from = %current.status,
                to = %next,
                "Submission status updated"
            );
            return Ok(true);
        }

        debug!(
            submission = %submission.id,
            attempt,
            "Status changed concurrently, recomputing"
        );
    }

    warn!(
        submission = %submission.id,
        "Gave up on status write after {} conflicts",
        MAX_CAS_ATTEMPTS
    );
    Ok(false)
}

/// Run the count queries the predicate needs for this submission type.
async fn tally_deliverables(
    deliverables: &dyn DeliverableStore,
    submission: &Submission,
    settings: &CampaignSettings,
) -> WorkerResult<DeliverableTally> {
    let user = submission.user_id.as_str();
    let campaign = submission.campaign_id.as_str();
    let mut tally = DeliverableTally::default();

    match submission.submission_type {
        SubmissionType::FirstDraft => {
            tally.videos = deliverables
                .count(
                    user,
                    campaign,
                    DeliverableKind::Video,
                    StatusFilter::IsNot(DeliverableStatus::RevisionRequested),
                )
                .await?;
            if settings.raw_footage {
                tally.raw_footage = deliverables
                    .count(user, campaign, DeliverableKind::RawFootage, StatusFilter::Any)
                    .await?;
            }
            if settings.photos {
                tally.photos = deliverables
                    .count(user, campaign, DeliverableKind::Photo, StatusFilter::Any)
                    .await?;
            }
        }
        SubmissionType::FinalDraft => {
            tally.videos_revision_requested = deliverables
                .count(
                    user,
                    campaign,
                    DeliverableKind::Video,
                    StatusFilter::Is(DeliverableStatus::RevisionRequested),
                )
                .await?;
            if settings.raw_footage {
                tally.raw_footage_revision_requested = deliverables
                    .count(
                        user,
                        campaign,
                        DeliverableKind::RawFootage,
                        StatusFilter::Is(DeliverableStatus::RevisionRequested),
                    )
                    .await?;
            }
            if settings.photos {
                tally.photos_revision_requested = deliverables
                    .count(
                        user,
                        campaign,
                        DeliverableKind::Photo,
                        StatusFilter::Is(DeliverableStatus::RevisionRequested),
                    )
                    .await?;
            }
        }
        _ => {}
    }

    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use campkit_models::{Deliverable, ShortlistedCreator};
    use campkit_platform::MemoryStore;

    fn settings(raw_footage: bool, photos: bool, credits: Option<u32>) -> CampaignSettings {
        CampaignSettings {
            campaign_id: "camp_1".to_string(),
            raw_footage,
            photos,
            campaign_credits: credits,
        }
    }

    #[test]
    fn ugc_first_draft_complete_with_one_video() {
        let tally = DeliverableTally {
            videos: 1,
            ..Default::default()
        };
        let sent =
            all_deliverables_sent(SubmissionType::FirstDraft, &settings(false, false, None), None, &tally)
                .unwrap();
        assert!(sent);
        assert_eq!(
            next_status(
                SubmissionVersion::Legacy,
                SubmissionType::FirstDraft,
                SubmissionStatus::NotStarted,
                sent,
            ),
            Some((SubmissionStatus::PendingReview, true))
        );
    }

    #[test]
    fn credit_first_draft_incomplete_below_contract() {
        let tally = DeliverableTally {
            videos: 2,
            ..Default::default()
        };
        let sent = all_deliverables_sent(
            SubmissionType::FirstDraft,
            &settings(false, false, Some(10)),
            Some(3),
            &tally,
        )
        .unwrap();
        assert!(!sent);
        assert_eq!(
            next_status(
                SubmissionVersion::Legacy,
                SubmissionType::FirstDraft,
                SubmissionStatus::NotStarted,
                sent,
            ),
            Some((SubmissionStatus::InProgress, false))
        );
    }

    #[test]
    fn credit_first_draft_without_contract_is_precondition_error() {
        let tally = DeliverableTally::default();
        let err = all_deliverables_sent(
            SubmissionType::FirstDraft,
            &settings(false, false, Some(10)),
            None,
            &tally,
        )
        .unwrap_err();
        assert!(matches!(err, WorkerError::Precondition(_)));
        assert_eq!(err.to_string(), "UGC Credits is not assigned to this creator");
    }

    #[test]
    fn final_draft_blocked_by_outstanding_video_revision() {
        let tally = DeliverableTally {
            videos_revision_requested: 1,
            photos_revision_requested: 0,
            ..Default::default()
        };
        let sent = all_deliverables_sent(
            SubmissionType::FinalDraft,
            &settings(false, true, None),
            None,
            &tally,
        )
        .unwrap();
        assert!(!sent);
        assert_eq!(
            next_status(
                SubmissionVersion::Legacy,
                SubmissionType::FinalDraft,
                SubmissionStatus::ChangesRequired,
                sent,
            ),
            Some((SubmissionStatus::ChangesRequired, false))
        );
    }

    #[test]
    fn legacy_pending_review_is_idempotent() {
        assert_eq!(
            next_status(
                SubmissionVersion::Legacy,
                SubmissionType::FirstDraft,
                SubmissionStatus::PendingReview,
                true,
            ),
            None
        );
    }

    #[test]
    fn v4_advances_in_progress_regardless_of_predicate() {
        assert_eq!(
            next_status(
                SubmissionVersion::V4,
                SubmissionType::FirstDraft,
                SubmissionStatus::InProgress,
                false,
            ),
            Some((SubmissionStatus::PendingReview, true))
        );
    }

    #[test]
    fn v4_never_downgrades() {
        for status in [
            SubmissionStatus::PendingReview,
            SubmissionStatus::Approved,
            SubmissionStatus::Posted,
        ] {
            assert_eq!(
                next_status(SubmissionVersion::V4, SubmissionType::FinalDraft, status, true),
                None
            );
        }
    }

    #[tokio::test]
    async fn run_moves_ugc_first_draft_to_pending_review() {
        let store = MemoryStore::new();
        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft)
            .with_status(SubmissionStatus::NotStarted);
        store.insert_submission(submission.clone());
        store.insert_campaign(settings(false, false, None));
        store.push_deliverable(Deliverable::new(
            DeliverableKind::Video,
            "https://cdn.example.com/a.mp4",
            submission.id.clone(),
            "camp_1",
            "user_1",
        ));

        let wrote = run(&store, &store, &store, &submission).await.unwrap();
        assert!(wrote);

        let stored = store.submission(&submission.id).unwrap();
        assert_eq!(stored.status, SubmissionStatus::PendingReview);
        assert!(stored.submission_date.is_some());
    }

    fn shortlist(ugc_videos: Option<u32>) -> ShortlistedCreator {
        ShortlistedCreator {
            user_id: "user_1".to_string(),
            campaign_id: "camp_1".to_string(),
            ugc_videos,
        }
    }

    fn push_videos(store: &MemoryStore, submission: &Submission, n: usize) {
        for i in 0..n {
            store.push_deliverable(Deliverable::new(
                DeliverableKind::Video,
                format!("https://cdn.example.com/{}.mp4", i),
                submission.id.clone(),
                "camp_1",
                "user_1",
            ));
        }
    }

    #[tokio::test]
    async fn run_credit_campaign_below_contract_goes_in_progress() {
        let store = MemoryStore::new();
        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft)
            .with_status(SubmissionStatus::NotStarted);
        store.insert_submission(submission.clone());
        store.insert_campaign(settings(false, false, Some(10)));
        store.insert_shortlisted(shortlist(Some(3)));
        push_videos(&store, &submission, 2);

        let wrote = run(&store, &store, &store, &submission).await.unwrap();
        assert!(wrote);

        let stored = store.submission(&submission.id).unwrap();
        assert_eq!(stored.status, SubmissionStatus::InProgress);
        assert!(stored.submission_date.is_none());
    }

    #[tokio::test]
    async fn run_credit_campaign_at_contract_goes_pending_review() {
        let store = MemoryStore::new();
        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft)
            .with_status(SubmissionStatus::InProgress);
        store.insert_submission(submission.clone());
        store.insert_campaign(settings(false, false, Some(10)));
        store.insert_shortlisted(shortlist(Some(3)));
        push_videos(&store, &submission, 3);

        let wrote = run(&store, &store, &store, &submission).await.unwrap();
        assert!(wrote);

        let stored = store.submission(&submission.id).unwrap();
        assert_eq!(stored.status, SubmissionStatus::PendingReview);
        assert!(stored.submission_date.is_some());
    }

    #[tokio::test]
    async fn run_credit_campaign_without_shortlist_is_precondition_error() {
        let store = MemoryStore::new();
        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft)
            .with_status(SubmissionStatus::NotStarted);
        store.insert_submission(submission.clone());
        store.insert_campaign(settings(false, false, Some(10)));
        push_videos(&store, &submission, 1);

        let err = run(&store, &store, &store, &submission).await.unwrap_err();
        assert!(matches!(err, WorkerError::Precondition(_)));
        assert_eq!(err.to_string(), "UGC Credits is not assigned to this creator");

        // The failed pass must not have touched the submission.
        assert_eq!(
            store.submission(&submission.id).unwrap().status,
            SubmissionStatus::NotStarted
        );
    }

    #[tokio::test]
    async fn run_second_pass_leaves_pending_review_untouched() {
        let store = MemoryStore::new();
        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft)
            .with_status(SubmissionStatus::PendingReview);
        store.insert_submission(submission.clone());
        store.insert_campaign(settings(false, false, None));

        let wrote = run(&store, &store, &store, &submission).await.unwrap();
        assert!(!wrote);
        assert_eq!(
            store.submission(&submission.id).unwrap().status,
            SubmissionStatus::PendingReview
        );
    }

    #[tokio::test]
    async fn run_v4_pending_review_keeps_date() {
        let store = MemoryStore::new();
        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft)
            .with_version(SubmissionVersion::V4)
            .with_status(SubmissionStatus::PendingReview);
        store.insert_submission(submission.clone());

        let wrote = run(&store, &store, &store, &submission).await.unwrap();
        assert!(!wrote);

        let stored = store.submission(&submission.id).unwrap();
        assert_eq!(stored.status, SubmissionStatus::PendingReview);
        assert!(stored.submission_date.is_none());
    }

    #[tokio::test]
    async fn run_skips_non_draft_types() {
        let store = MemoryStore::new();
        let submission = Submission::new("camp_1", "user_1", SubmissionType::AgreementForm)
            .with_status(SubmissionStatus::InProgress);
        store.insert_submission(submission.clone());

        let wrote = run(&store, &store, &store, &submission).await.unwrap();
        assert!(!wrote);
        assert_eq!(
            store.submission(&submission.id).unwrap().status,
            SubmissionStatus::InProgress
        );
    }

    #[tokio::test]
    async fn run_missing_submission_is_precondition_error() {
        let store = MemoryStore::new();
        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft);

        let err = run(&store, &store, &store, &submission).await.unwrap_err();
        assert!(matches!(err, WorkerError::Precondition(_)));
    }
}
