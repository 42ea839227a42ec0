//! Deliverable (media record) models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::submission::SubmissionId;

/// Which deliverable table a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliverableKind {
    Video,
    RawFootage,
    Photo,
}

impl DeliverableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliverableKind::Video => "VIDEO",
            DeliverableKind::RawFootage => "RAW_FOOTAGE",
            DeliverableKind::Photo => "PHOTO",
        }
    }
}

impl fmt::Display for DeliverableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Review status of a deliverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliverableStatus {
    /// Awaiting review
    #[default]
    Pending,
    /// Accepted by review
    Approved,
    /// Review asked the creator to redo this item
    RevisionRequested,
}

impl DeliverableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliverableStatus::Pending => "PENDING",
            DeliverableStatus::Approved => "APPROVED",
            DeliverableStatus::RevisionRequested => "REVISION_REQUESTED",
        }
    }
}

impl fmt::Display for DeliverableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A video, raw-footage, or photo record tied to a submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    /// Unique record ID
    pub id: String,

    /// Which table this record belongs to
    pub kind: DeliverableKind,

    /// Public URL of the uploaded media
    pub url: String,

    /// Submission this deliverable fulfils
    pub submission_id: SubmissionId,

    /// Campaign the submission belongs to
    pub campaign_id: String,

    /// Creator (owner) user ID
    pub user_id: String,

    /// Review status
    #[serde(default)]
    pub status: DeliverableStatus,
}

impl Deliverable {
    /// Create a new pending deliverable.
    pub fn new(
        kind: DeliverableKind,
        url: impl Into<String>,
        submission_id: SubmissionId,
        campaign_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            url: url.into(),
            submission_id,
            campaign_id: campaign_id.into(),
            user_id: user_id.into(),
            status: DeliverableStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_deliverable_is_pending() {
        let d = Deliverable::new(
            DeliverableKind::Video,
            "https://cdn.example.com/a.mp4",
            SubmissionId::new(),
            "camp_1",
            "user_1",
        );
        assert_eq!(d.status, DeliverableStatus::Pending);
    }

    #[test]
    fn kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&DeliverableKind::RawFootage).unwrap(),
            "\"RAW_FOOTAGE\""
        );
        assert_eq!(
            serde_json::to_string(&DeliverableStatus::RevisionRequested).unwrap(),
            "\"REVISION_REQUESTED\""
        );
    }
}
