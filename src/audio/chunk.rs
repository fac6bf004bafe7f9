//! PCM chunk and recording-session types.
//!
//! [`AudioChunk`] is the unit everything else moves around: one frame of
//! mono, 16-bit signed samples with the capture gain already applied.
//! [`RecordingSession`] accumulates chunks for a single received message,
//! starting from the pre-roll snapshot taken when the carrier appears.

use crate::audio::buffer::PreRollBuffer;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// One frame of mono 16-bit PCM, immutable once produced.
///
/// The capture loop applies the input gain before constructing a chunk, so
/// consumers never re-scale captured audio; the output gain is applied
/// separately at playback time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    samples: Vec<i16>,
}

impl AudioChunk {
    /// Wrap a buffer of samples.
    pub fn new(samples: Vec<i16>) -> Self {
        Self { samples }
    }

    /// The samples in this chunk.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when the chunk holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// The audio of one received message.
///
/// Created when the carrier appears, seeded with the pre-roll snapshot so
/// the first syllable spoken before carrier detect settled is not lost, and
/// grown by the capture loop until the carrier drops.  After that the
/// session is frozen (moved out of the capture loop) and consumed read-only
/// by the retransmission pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingSession {
    chunks: Vec<AudioChunk>,
}

impl RecordingSession {
    /// Start a session from the current pre-roll contents.
    pub fn from_pre_roll(pre_roll: &PreRollBuffer) -> Self {
        Self {
            chunks: pre_roll.snapshot(),
        }
    }

    /// Append a live chunk.
    pub fn push(&mut self, chunk: AudioChunk) {
        self.chunks.push(chunk);
    }

    /// The recorded chunks in capture order.
    pub fn chunks(&self) -> &[AudioChunk] {
        &self.chunks
    }

    /// Consume the session, yielding its chunks for playback.
    pub fn into_chunks(self) -> Vec<AudioChunk> {
        self.chunks
    }

    /// Number of chunks recorded so far.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` when nothing was recorded (e.g. a noise spike shorter
    /// than one capture frame with an empty pre-roll).
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Recorded duration in seconds at the given sample rate.
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        if sample_rate == 0 {
            return 0.0;
        }
        let total: usize = self.chunks.iter().map(AudioChunk::len).sum();
        total as f32 / sample_rate as f32
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
