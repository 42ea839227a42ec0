//! Real-time event schemas pushed to creator clients.
//!
//! Payload field names match the existing Node clients and must stay stable.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Event name for per-file progress updates.
pub const PROGRESS_EVENT: &str = "progress";

/// Event name for the refetch signal after a status write.
pub const UPDATE_SUBMISSION_EVENT: &str = "updateSubmission";

/// Legacy event label emitted when a transcode finishes. Existing clients
/// match on this string, so it is kept byte-for-byte.
pub const COMPRESSION_START_NAME: &str = "Compression Start";

/// Per-file progress payload: `{type, fileName, progress}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FileProgress {
    /// Transcoding in progress
    #[serde(rename = "processing")]
    Processing {
        #[serde(rename = "fileName")]
        file_name: String,
        progress: u8,
    },
    /// Upload to object storage in progress
    #[serde(rename = "uploading")]
    Uploading {
        #[serde(rename = "fileName")]
        file_name: String,
        progress: u8,
    },
}

/// Legacy transcode-complete payload:
/// `{"progress":100,"name":"Compression Start","fileSize":..,"fileType":..}`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompressionStart {
    pub progress: u8,
    pub name: String,
    #[serde(rename = "fileSize")]
    pub file_size: u64,
    #[serde(rename = "fileType")]
    pub file_type: String,
}

impl CompressionStart {
    pub fn new(file_size: u64, file_type: impl Into<String>) -> Self {
        Self {
            progress: 100,
            name: COMPRESSION_START_NAME.to_string(),
            file_size,
            file_type: file_type.into(),
        }
    }
}

/// Events emitted to a creator's live connection during processing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreatorEvent {
    /// Per-file transcode/upload progress
    Progress(FileProgress),
    /// Transcode finished for one file (legacy event shape)
    CompressionStart(CompressionStart),
    /// Submission status changed; client should refetch
    UpdateSubmission,
}

impl CreatorEvent {
    /// Transcode progress for one file.
    pub fn processing(file_name: impl Into<String>, progress: u8) -> Self {
        CreatorEvent::Progress(FileProgress::Processing {
            file_name: file_name.into(),
            progress: progress.min(100),
        })
    }

    /// Upload progress for one file.
    pub fn uploading(file_name: impl Into<String>, progress: u8) -> Self {
        CreatorEvent::Progress(FileProgress::Uploading {
            file_name: file_name.into(),
            progress: progress.min(100),
        })
    }

    /// Transcode completion for one file.
    pub fn compression_start(file_size: u64, file_type: impl Into<String>) -> Self {
        CreatorEvent::CompressionStart(CompressionStart::new(file_size, file_type))
    }

    /// Wire event name on the real-time channel.
    pub fn event_name(&self) -> &'static str {
        match self {
            CreatorEvent::Progress(_) | CreatorEvent::CompressionStart(_) => PROGRESS_EVENT,
            CreatorEvent::UpdateSubmission => UPDATE_SUBMISSION_EVENT,
        }
    }

    /// Wire payload, if the event carries one.
    pub fn payload(&self) -> Option<serde_json::Value> {
        match self {
            CreatorEvent::Progress(p) => serde_json::to_value(p).ok(),
            CreatorEvent::CompressionStart(c) => serde_json::to_value(c).ok(),
            CreatorEvent::UpdateSubmission => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_payload_shape() {
        let event = CreatorEvent::processing("clip.mov", 42);
        let payload = event.payload().unwrap();
        assert_eq!(payload["type"], "processing");
        assert_eq!(payload["fileName"], "clip.mov");
        assert_eq!(payload["progress"], 42);
        assert_eq!(event.event_name(), "progress");
    }

    #[test]
    fn uploading_clamps_progress() {
        let event = CreatorEvent::uploading("clip.mov", 150);
        let payload = event.payload().unwrap();
        assert_eq!(payload["progress"], 100);
        assert_eq!(payload["type"], "uploading");
    }

    #[test]
    fn compression_start_is_wire_exact() {
        let event = CreatorEvent::compression_start(1_048_576, "video/mp4");
        let payload = event.payload().unwrap();
        let json = serde_json::to_string(&payload).unwrap();
        assert_eq!(
            json,
            "{\"fileSize\":1048576,\"fileType\":\"video/mp4\",\"name\":\"Compression Start\",\"progress\":100}"
        );
    }

    #[test]
    fn update_submission_has_no_payload() {
        let event = CreatorEvent::UpdateSubmission;
        assert!(event.payload().is_none());
        assert_eq!(event.event_name(), "updateSubmission");
    }
}
