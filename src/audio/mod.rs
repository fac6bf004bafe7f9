//! Audio pipeline — capture, pre-roll, gain scaling, playback.
//!
//! # Pipeline
//!
//! ```text
//! Input stream ──▶ capture loop ──▶ input gain ──▶ PreRollBuffer (always)
//!                        │                              │ snapshot on
//!                        └──▶ RecordingSession ◀────────┘ carrier detect
//!                                    │ frozen on carrier drop
//!                                    ▼
//!                     play_chunks ──▶ output gain ──▶ Output stream
//! ```
//!
//! The capture loop is a process-lifetime OS thread; playback passes are
//! transient blocking tasks.  Both go through the [`AudioDevice`] seam so
//! tests can run the whole pipeline against in-memory streams.

pub mod buffer;
pub mod chunk;
pub mod device;
pub mod gain;
pub mod pipeline;
pub mod tone;

pub use buffer::PreRollBuffer;
pub use chunk::{AudioChunk, RecordingSession};
pub use device::{AudioDevice, AudioError, AudioInput, AudioOutput, CpalAudioDevice};
pub use gain::{adjust_volume, clamp_gain, MAX_GAIN, MIN_GAIN};
pub use pipeline::{capture_channel, play_chunks, run_capture, CaptureCommand, CaptureHandle};
pub use tone::{tone_chunks, tone_samples, FALLBACK_TONE_HZ, FALLBACK_TONE_SECS};

// test-only re-export so other modules' test suites can import the mock
// device without `use crate::audio::device::MockAudioDevice`.
#[cfg(test)]
pub use device::MockAudioDevice;
