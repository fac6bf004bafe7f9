//! Announcement source: decoded identification clip or fallback tone.
//!
//! The configured clip can be any format the system `ffmpeg` understands;
//! it is transcoded to the repeater's raw PCM format on every announcement.
//! Whatever goes wrong — missing binary, missing clip, decode failure — the
//! station still identifies: a short sine tone replaces the clip.

use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::audio::{tone_chunks, AudioChunk, FALLBACK_TONE_HZ, FALLBACK_TONE_SECS};

/// Hard ceiling on announcement length.
pub const MAX_ANNOUNCEMENT_SECS: u32 = 10;

// ---------------------------------------------------------------------------
// TranscodeError
// ---------------------------------------------------------------------------

/// Errors from the external transcoding step.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// ffmpeg could not be started at all.
    #[error("failed to run ffmpeg: {0}")]
    Spawn(#[from] std::io::Error),

    /// ffmpeg ran but reported failure.
    #[error("ffmpeg failed: {0}")]
    Failed(String),

    /// ffmpeg succeeded but produced no samples.
    #[error("ffmpeg produced no audio")]
    Empty,
}

// ---------------------------------------------------------------------------
// transcode_clip
// ---------------------------------------------------------------------------

/// Decode `path` to mono s16le PCM at `sample_rate` via the system ffmpeg.
///
/// Blocking (runs a subprocess to completion); call it from a
/// blocking-capable thread.
pub fn transcode_clip(path: &Path, sample_rate: u32) -> Result<Vec<i16>, TranscodeError> {
    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(path)
        .args(["-f", "s16le", "-acodec", "pcm_s16le"])
        .arg("-ar")
        .arg(sample_rate.to_string())
        .args(["-ac", "1"])
        .arg("-")
        .stdin(Stdio::null())
        .output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = stderr.lines().last().unwrap_or("unknown error").to_string();
        return Err(TranscodeError::Failed(detail));
    }

    let samples: Vec<i16> = output
        .stdout
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    if samples.is_empty() {
        return Err(TranscodeError::Empty);
    }
    Ok(samples)
}

// ---------------------------------------------------------------------------
// AnnouncementSource
// ---------------------------------------------------------------------------

/// The audio to play for one identification.
#[derive(Debug)]
pub enum AnnouncementSource {
    /// The configured clip, decoded and capped.
    Clip(Vec<AudioChunk>),
    /// Synthesized tone used when the clip could not be decoded.
    FallbackTone(Vec<AudioChunk>),
}

impl AnnouncementSource {
    /// Build the source for one announcement.
    ///
    /// Transcode failure is never fatal — it degrades to the fallback tone.
    pub fn build(clip_path: &Path, sample_rate: u32, frame_size: usize) -> Self {
        match transcode_clip(clip_path, sample_rate) {
            Ok(samples) => {
                let capped = cap_samples(samples, sample_rate, MAX_ANNOUNCEMENT_SECS);
                log::info!(
                    "identification clip decoded: {:.2}s",
                    capped.len() as f32 / sample_rate as f32
                );
                Self::Clip(chunks_from_samples(&capped, frame_size))
            }
            Err(e) => {
                log::warn!(
                    "identification clip {} unusable ({e}); playing fallback tone",
                    clip_path.display()
                );
                Self::FallbackTone(tone_chunks(
                    FALLBACK_TONE_HZ,
                    FALLBACK_TONE_SECS,
                    sample_rate,
                    frame_size,
                ))
            }
        }
    }

    /// The chunks to play.
    pub fn chunks(&self) -> &[AudioChunk] {
        match self {
            Self::Clip(chunks) | Self::FallbackTone(chunks) => chunks,
        }
    }

    /// Playback gain for this source.  The tone plays at half the output
    /// gain so a decode failure does not blast the channel.
    pub fn playback_gain(&self, output_gain: f32) -> f32 {
        match self {
            Self::Clip(_) => output_gain,
            Self::FallbackTone(_) => output_gain * 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Truncate to at most `max_secs` of audio, at sample granularity.
pub fn cap_samples(mut samples: Vec<i16>, sample_rate: u32, max_secs: u32) -> Vec<i16> {
    let max_len = (sample_rate as usize) * (max_secs as usize);
    if samples.len() > max_len {
        log::warn!("identification clip too long, capped at {max_secs}s");
        samples.truncate(max_len);
    }
    samples
}

/// Split samples into frame-sized chunks, padding the final frame with
/// silence.
pub fn chunks_from_samples(samples: &[i16], frame_size: usize) -> Vec<AudioChunk> {
    samples
        .chunks(frame_size)
        .map(|frame| {
            let mut padded = frame.to_vec();
            padded.resize(frame_size, 0);
            AudioChunk::new(padded)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
