//! FFmpeg CLI wrapper for submission transcoding.
//!
//! Drives the external `ffmpeg`/`ffprobe` binaries to re-encode creator
//! uploads to the platform's fixed delivery profile, with percent-complete
//! progress parsed from FFmpeg's `-progress` output.

pub mod command;
pub mod error;
pub mod probe;
pub mod progress;
pub mod transcode;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use transcode::{transcode, TranscodeProfile};
