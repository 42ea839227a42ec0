//! Shared data models for the Campkit submission pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Submissions, deliverables, and campaign configuration
//! - Queue job payloads
//! - Real-time event schemas pushed to creator clients

pub mod campaign;
pub mod deliverable;
pub mod events;
pub mod job;
pub mod submission;

// Re-export common types
pub use campaign::{CampaignSettings, ShortlistedCreator};
pub use deliverable::{Deliverable, DeliverableKind, DeliverableStatus};
pub use events::CreatorEvent;
pub use job::{JobId, ProcessSubmissionJob, SubmissionFile};
pub use submission::{
    Submission, SubmissionId, SubmissionStatus, SubmissionType, SubmissionVersion,
};
