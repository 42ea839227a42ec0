//! In-memory store for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use campkit_models::{
    CampaignSettings, Deliverable, DeliverableKind, ShortlistedCreator, Submission, SubmissionId,
    SubmissionStatus,
};

use crate::error::PlatformResult;
use crate::store::{CampaignStore, DeliverableStore, StatusFilter, SubmissionStore};

#[derive(Default)]
struct Inner {
    submissions: HashMap<SubmissionId, Submission>,
    deliverables: Vec<Deliverable>,
    campaigns: HashMap<String, CampaignSettings>,
    shortlist: HashMap<(String, String), ShortlistedCreator>,
}

/// Mutex-backed implementation of all three store traits.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_submission(&self, submission: Submission) {
        let mut inner = self.inner.lock().unwrap();
        inner.submissions.insert(submission.id.clone(), submission);
    }

    pub fn insert_campaign(&self, settings: CampaignSettings) {
        let mut inner = self.inner.lock().unwrap();
        inner.campaigns.insert(settings.campaign_id.clone(), settings);
    }

    pub fn insert_shortlisted(&self, creator: ShortlistedCreator) {
        let mut inner = self.inner.lock().unwrap();
        inner.shortlist.insert(
            (creator.user_id.clone(), creator.campaign_id.clone()),
            creator,
        );
    }

    pub fn push_deliverable(&self, deliverable: Deliverable) {
        let mut inner = self.inner.lock().unwrap();
        inner.deliverables.push(deliverable);
    }

    /// Snapshot of a submission, for assertions.
    pub fn submission(&self, id: &SubmissionId) -> Option<Submission> {
        self.inner.lock().unwrap().submissions.get(id).cloned()
    }

    /// Number of stored deliverables, for assertions.
    pub fn deliverable_count(&self) -> usize {
        self.inner.lock().unwrap().deliverables.len()
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn get(&self, id: &SubmissionId) -> PlatformResult<Option<Submission>> {
        Ok(self.inner.lock().unwrap().submissions.get(id).cloned())
    }

    async fn set_caption_and_date(
        &self,
        id: &SubmissionId,
        caption: Option<&str>,
        submission_date: DateTime<Utc>,
    ) -> PlatformResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(submission) = inner.submissions.get_mut(id) {
            submission.caption = caption.map(str::to_string);
            submission.submission_date = Some(submission_date);
        }
        Ok(())
    }

    async fn update_status_if(
        &self,
        id: &SubmissionId,
        expected: SubmissionStatus,
        next: SubmissionStatus,
        submission_date: Option<DateTime<Utc>>,
    ) -> PlatformResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.submissions.get_mut(id) {
            Some(submission) if submission.status == expected => {
                submission.status = next;
                if let Some(date) = submission_date {
                    submission.submission_date = Some(date);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl DeliverableStore for MemoryStore {
    async fn insert(&self, deliverable: &Deliverable) -> PlatformResult<()> {
        self.inner.lock().unwrap().deliverables.push(deliverable.clone());
        Ok(())
    }

    async fn count(
        &self,
        user_id: &str,
        campaign_id: &str,
        kind: DeliverableKind,
        filter: StatusFilter,
    ) -> PlatformResult<u64> {
        let inner = self.inner.lock().unwrap();
        let count = inner
            .deliverables
            .iter()
            .filter(|d| {
                d.user_id == user_id
                    && d.campaign_id == campaign_id
                    && d.kind == kind
                    && filter.matches(d.status)
            })
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn settings(&self, campaign_id: &str) -> PlatformResult<Option<CampaignSettings>> {
        Ok(self.inner.lock().unwrap().campaigns.get(campaign_id).cloned())
    }

    async fn shortlisted(
        &self,
        user_id: &str,
        campaign_id: &str,
    ) -> PlatformResult<Option<ShortlistedCreator>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .shortlist
            .get(&(user_id.to_string(), campaign_id.to_string()))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campkit_models::{DeliverableStatus, SubmissionType};

    #[tokio::test]
    async fn cas_only_writes_when_expected_matches() {
        let store = MemoryStore::new();
        let submission = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft)
            .with_status(SubmissionStatus::InProgress);
        let id = submission.id.clone();
        store.insert_submission(submission);

        let updated = store
            .update_status_if(
                &id,
                SubmissionStatus::InProgress,
                SubmissionStatus::PendingReview,
                Some(Utc::now()),
            )
            .await
            .unwrap();
        assert!(updated);
        assert_eq!(
            store.submission(&id).unwrap().status,
            SubmissionStatus::PendingReview
        );

        // Second write against the stale expected status is refused.
        let updated = store
            .update_status_if(
                &id,
                SubmissionStatus::InProgress,
                SubmissionStatus::ChangesRequired,
                None,
            )
            .await
            .unwrap();
        assert!(!updated);
    }

    #[tokio::test]
    async fn count_applies_status_filter() {
        let store = MemoryStore::new();
        let sub_id = SubmissionId::new();
        let mut revised = Deliverable::new(
            DeliverableKind::Video,
            "https://cdn.example.com/a.mp4",
            sub_id.clone(),
            "camp_1",
            "user_1",
        );
        revised.status = DeliverableStatus::RevisionRequested;
        store.push_deliverable(revised);
        store.push_deliverable(Deliverable::new(
            DeliverableKind::Video,
            "https://cdn.example.com/b.mp4",
            sub_id,
            "camp_1",
            "user_1",
        ));

        let all = store
            .count("user_1", "camp_1", DeliverableKind::Video, StatusFilter::Any)
            .await
            .unwrap();
        assert_eq!(all, 2);

        let pending_or_approved = store
            .count(
                "user_1",
                "camp_1",
                DeliverableKind::Video,
                StatusFilter::IsNot(DeliverableStatus::RevisionRequested),
            )
            .await
            .unwrap();
        assert_eq!(pending_or_approved, 1);
    }
}
