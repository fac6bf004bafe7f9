//! Sine-tone synthesis for the identification fallback.
//!
//! When the station-identification clip cannot be decoded, the repeater
//! plays a short tone instead of staying silent, so the station still
//! identifies on schedule.

use crate::audio::chunk::AudioChunk;

/// Frequency of the fallback identification tone.
pub const FALLBACK_TONE_HZ: f32 = 800.0;
/// Duration of the fallback identification tone in seconds.
pub const FALLBACK_TONE_SECS: f32 = 2.0;

/// Peak amplitude: half of full scale, leaving headroom for output gain.
const TONE_AMPLITUDE: f32 = 16_384.0;

/// Generate a sine tone as raw samples.
pub fn tone_samples(freq_hz: f32, duration_secs: f32, sample_rate: u32) -> Vec<i16> {
    let total = (duration_secs * sample_rate as f32) as usize;
    (0..total)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (TONE_AMPLITUDE * (2.0 * std::f32::consts::PI * freq_hz * t).sin()) as i16
        })
        .collect()
}

/// Generate a sine tone chunked to `frame_size`, padding the final frame
/// with silence.
pub fn tone_chunks(
    freq_hz: f32,
    duration_secs: f32,
    sample_rate: u32,
    frame_size: usize,
) -> Vec<AudioChunk> {
    let samples = tone_samples(freq_hz, duration_secs, sample_rate);
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
