//! Submission transcoding with the fixed delivery profile.

use std::path::Path;
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_media;

/// Target codec/quality profile for creator uploads.
///
/// Deliverables are reviewed in-browser, so the profile favors encode speed
/// and broad playback compatibility over size.
#[derive(Debug, Clone)]
pub struct TranscodeProfile {
    /// Video codec
    pub video_codec: String,
    /// Constant rate factor
    pub crf: u8,
    /// Encoder preset
    pub preset: String,
    /// Pixel format
    pub pix_fmt: String,
    /// Audio codec
    pub audio_codec: String,
    /// Audio bitrate
    pub audio_bitrate: String,
    /// Transcode timeout in seconds, if any
    pub timeout_secs: Option<u64>,
}

impl Default for TranscodeProfile {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            crf: 26,
            preset: "ultrafast".to_string(),
            pix_fmt: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            timeout_secs: None,
        }
    }
}

/// Transcode `input` to `output` with the given profile.
///
/// `on_progress` receives percent-complete in 0..=100. The final invocation
/// is always 100 when FFmpeg reports the end of its progress stream.
pub async fn transcode<F>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    profile: &TranscodeProfile,
    on_progress: F,
) -> MediaResult<()>
where
    F: Fn(u8) + Send + 'static,
{
    let input = input.as_ref();
    let output = output.as_ref();

    let info = probe_media(input).await?;
    let duration_ms = info.duration_ms;

    let cmd = FfmpegCommand::new(input, output)
        .video_codec(&profile.video_codec)
        .crf(profile.crf)
        .preset(&profile.preset)
        .pix_fmt(&profile.pix_fmt)
        .audio_codec(&profile.audio_codec)
        .audio_bitrate(&profile.audio_bitrate)
        // Moov atom up front so review players can start immediately
        .output_args(["-movflags", "+faststart"]);

    let mut runner = FfmpegRunner::new();
    if let Some(secs) = profile.timeout_secs {
        runner = runner.with_timeout(secs);
    }

    runner
        .run_with_progress(&cmd, move |progress| {
            let percent = if progress.is_complete {
                100
            } else {
                progress.percentage(duration_ms) as u8
            };
            on_progress(percent);
        })
        .await?;

    info!(
        input = %input.display(),
        output = %output.display(),
        "Transcode complete"
    );

    Ok(())
}
