//! Fixed-capacity pre-roll ring of recently captured chunks.
//!
//! The capture loop pushes every frame it reads into this buffer, whatever
//! the relay is doing.  When the buffer is full, new chunks **evict** the
//! oldest so the most-recent `capacity` frames are always available.  A
//! recording session starts from a [`snapshot`](PreRollBuffer::snapshot) of
//! the buffer, which copies the contents without disturbing them — the ring
//! keeps rolling through receive, transmit and announce alike.
//!
//! # Example
//!
//! ```rust
//! use simplex_repeater::audio::{AudioChunk, PreRollBuffer};
//!
//! let mut buf = PreRollBuffer::new(2);
//! buf.push(AudioChunk::new(vec![1]));
//! buf.push(AudioChunk::new(vec![2]));
//! buf.push(AudioChunk::new(vec![3])); // capacity 2 → chunk [1] evicted
//! let snap = buf.snapshot();
//! assert_eq!(snap[0].samples(), &[2]);
//! assert_eq!(snap[1].samples(), &[3]);
//! ```

use std::collections::VecDeque;

use crate::audio::chunk::AudioChunk;

// ---------------------------------------------------------------------------
// PreRollBuffer
// ---------------------------------------------------------------------------

/// A fixed-capacity FIFO ring of [`AudioChunk`]s.
///
/// ## Overflow behaviour
///
/// When [`push`](Self::push) would exceed `capacity`, the oldest chunk is
/// silently dropped.  The buffer never holds more than `capacity` chunks.
pub struct PreRollBuffer {
    chunks: VecDeque<AudioChunk>,
    capacity: usize,
}

impl PreRollBuffer {
    /// Create a new pre-roll buffer with the given `capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "PreRollBuffer capacity must be > 0");
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `chunk`, evicting the oldest chunk when full.
    pub fn push(&mut self, chunk: AudioChunk) {
        if self.chunks.len() == self.capacity {
            self.chunks.pop_front();
        }
        self.chunks.push_back(chunk);
    }

    /// Copy the current contents in arrival order.
    ///
    /// The buffer is left untouched; capture continues to roll into it.
    pub fn snapshot(&self) -> Vec<AudioChunk> {
        self.chunks.iter().cloned().collect()
    }

    /// Number of chunks currently stored.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` when the buffer contains no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Maximum number of chunks the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` when the next push will evict the oldest chunk.
    pub fn is_full(&self) -> bool {
        self.chunks.len() == self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
