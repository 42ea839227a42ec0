//! Submission models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct SubmissionId(pub String);

impl SubmissionId {
    /// Generate a new random submission ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SubmissionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SubmissionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubmissionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of deliverable slot a submission represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionType {
    /// Signed agreement form
    AgreementForm,
    /// First content draft
    FirstDraft,
    /// Final content draft (revision round)
    FinalDraft,
    /// Social posting proof
    Posting,
}

impl SubmissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionType::AgreementForm => "AGREEMENT_FORM",
            SubmissionType::FirstDraft => "FIRST_DRAFT",
            SubmissionType::FinalDraft => "FINAL_DRAFT",
            SubmissionType::Posting => "POSTING",
        }
    }

    /// Whether the completion predicate applies to this type.
    pub fn is_draft(&self) -> bool {
        matches!(self, SubmissionType::FirstDraft | SubmissionType::FinalDraft)
    }
}

impl fmt::Display for SubmissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Submission workflow status.
///
/// The pipeline only ever writes `IN_PROGRESS`, `PENDING_REVIEW`, and
/// `CHANGES_REQUIRED`; the remaining states are reached through review
/// workflows and are treated as frozen inputs here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    #[default]
    NotStarted,
    InProgress,
    PendingReview,
    ChangesRequired,
    Approved,
    ClientApproved,
    Posted,
    OnHold,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::NotStarted => "NOT_STARTED",
            SubmissionStatus::InProgress => "IN_PROGRESS",
            SubmissionStatus::PendingReview => "PENDING_REVIEW",
            SubmissionStatus::ChangesRequired => "CHANGES_REQUIRED",
            SubmissionStatus::Approved => "APPROVED",
            SubmissionStatus::ClientApproved => "CLIENT_APPROVED",
            SubmissionStatus::Posted => "POSTED",
            SubmissionStatus::OnHold => "ON_HOLD",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Submission workflow generation.
///
/// v4 submissions hand status-gating to the v4 controllers; anything else
/// (older records store assorted strings or nothing at all) is legacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum SubmissionVersion {
    #[serde(rename = "v4")]
    V4,
    #[default]
    #[serde(other, rename = "legacy")]
    Legacy,
}

impl SubmissionVersion {
    pub fn is_v4(&self) -> bool {
        matches!(self, SubmissionVersion::V4)
    }
}

/// One deliverable slot for one creator in one campaign.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Unique submission ID
    pub id: SubmissionId,

    /// Campaign this submission belongs to
    pub campaign_id: String,

    /// Creator (owner) user ID
    pub user_id: String,

    /// Deliverable slot kind
    pub submission_type: SubmissionType,

    /// Workflow generation
    #[serde(default)]
    pub submission_version: SubmissionVersion,

    /// Current workflow status
    #[serde(default)]
    pub status: SubmissionStatus,

    /// Creator-provided caption
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// When content was last submitted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<DateTime<Utc>>,

    /// Upstream submission this one depends on (e.g. final draft on first draft)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependent_on: Option<SubmissionId>,
}

impl Submission {
    /// Create a new submission in its initial state.
    pub fn new(
        campaign_id: impl Into<String>,
        user_id: impl Into<String>,
        submission_type: SubmissionType,
    ) -> Self {
        Self {
            id: SubmissionId::new(),
            campaign_id: campaign_id.into(),
            user_id: user_id.into(),
            submission_type,
            submission_version: SubmissionVersion::Legacy,
            status: SubmissionStatus::NotStarted,
            caption: None,
            submission_date: None,
            dependent_on: None,
        }
    }

    /// Set the workflow generation.
    pub fn with_version(mut self, version: SubmissionVersion) -> Self {
        self.submission_version = version;
        self
    }

    /// Set the current status.
    pub fn with_status(mut self, status: SubmissionStatus) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_version_parses_v4() {
        let v: SubmissionVersion = serde_json::from_str("\"v4\"").unwrap();
        assert!(v.is_v4());
    }

    #[test]
    fn submission_version_unknown_is_legacy() {
        let v: SubmissionVersion = serde_json::from_str("\"v2\"").unwrap();
        assert_eq!(v, SubmissionVersion::Legacy);
    }

    #[test]
    fn submission_status_wire_names() {
        let json = serde_json::to_string(&SubmissionStatus::PendingReview).unwrap();
        assert_eq!(json, "\"PENDING_REVIEW\"");
        let status: SubmissionStatus = serde_json::from_str("\"CHANGES_REQUIRED\"").unwrap();
        assert_eq!(status, SubmissionStatus::ChangesRequired);
    }

    #[test]
    fn submission_serializes_camel_case() {
        let sub = Submission::new("camp_1", "user_1", SubmissionType::FirstDraft);
        let json = serde_json::to_string(&sub).unwrap();
        assert!(json.contains("\"campaignId\":\"camp_1\""));
        assert!(json.contains("\"submissionType\":\"FIRST_DRAFT\""));
    }
}
