//! Audio device capability over `cpal`.
//!
//! [`AudioDevice`] is the seam between the relay and the host's sound
//! hardware: it opens frame-granular input and output streams at the fixed
//! repeater format (mono 16-bit PCM).  [`CpalAudioDevice`] is the
//! production implementation; `MockAudioDevice` (under `#[cfg(test)]`)
//! lets the pipeline and state machine be exercised without sound hardware.
//!
//! cpal delivers and consumes audio on its own callback thread, so both
//! directions are bridged through buffers: the input callback forwards
//! sample buffers over a channel and [`AudioInput::read_frame`] re-frames
//! them with a bounded wait; [`AudioOutput::write_frame`] feeds a queue the
//! output callback drains, substituting silence on underrun.

use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running an audio stream.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no {0} device found on the default audio host")]
    NoDevice(&'static str),

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("audio stream closed")]
    Closed,

    #[error("playback failed: {0}")]
    PlaybackFailed(String),
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Factory for frame-granular audio streams.
///
/// `Send + Sync` so a single instance can serve the capture thread and the
/// transient playback tasks concurrently; each stream itself stays on the
/// thread that opened it.
pub trait AudioDevice: Send + Sync {
    /// Open the capture stream.
    fn open_input(&self) -> Result<Box<dyn AudioInput>, AudioError>;

    /// Open the playback stream.
    fn open_output(&self) -> Result<Box<dyn AudioOutput>, AudioError>;
}

/// A running capture stream.
pub trait AudioInput {
    /// Read one frame, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when no complete frame arrived within the timeout
    /// (an overflow or a quiet driver — not fatal) and `Err` when the
    /// stream is gone.
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<Vec<i16>>, AudioError>;
}

/// A running playback stream.
pub trait AudioOutput {
    /// Queue one frame for playback, blocking briefly when the device is
    /// behind.
    fn write_frame(&mut self, samples: &[i16]) -> Result<(), AudioError>;

    /// Block until everything queued has been handed to the device, at most
    /// `timeout`.
    fn drain(&mut self, timeout: Duration) -> Result<(), AudioError>;
}

// ---------------------------------------------------------------------------
// CpalAudioDevice
// ---------------------------------------------------------------------------

/// Production [`AudioDevice`] backed by the default cpal host.
///
/// Devices are looked up at stream-open time so the struct itself carries
/// no platform handles and is trivially `Send + Sync`.
pub struct CpalAudioDevice {
    sample_rate: u32,
    frame_size: usize,
}

impl CpalAudioDevice {
    /// Create a device factory for the given stream format.
    pub fn new(sample_rate: u32, frame_size: usize) -> Self {
        Self {
            sample_rate,
            frame_size,
        }
    }

    fn stream_config(&self) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        }
    }
}

impl AudioDevice for CpalAudioDevice {
    fn open_input(&self) -> Result<Box<dyn AudioInput>, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoDevice("input"))?;

        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let stream = device.build_input_stream(
            &self.stream_config(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(data.to_vec());
            },
            |err: cpal::StreamError| {
                log::error!("cpal input stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        Ok(Box::new(CpalInput {
            rx,
            pending: Vec::new(),
            frame_size: self.frame_size,
            _stream: stream,
        }))
    }

    fn open_output(&self) -> Result<Box<dyn AudioOutput>, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice("output"))?;

        let queue: Arc<Mutex<VecDeque<i16>>> = Arc::new(Mutex::new(VecDeque::new()));
        let callback_queue = Arc::clone(&queue);

        let stream = device.build_output_stream(
            &self.stream_config(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut q = match callback_queue.lock() {
                    Ok(q) => q,
                    Err(poisoned) => poisoned.into_inner(),
                };
                for sample in data.iter_mut() {
                    // Underrun reads as silence, never as an error.
                    *sample = match q.pop_front() {
                        Some(s) => s as f32 / 32_768.0,
                        None => 0.0,
                    };
                }
            },
            |err: cpal::StreamError| {
                log::error!("cpal output stream error: {err}");
            },
            None,
        )?;
        stream.play()?;

        Ok(Box::new(CpalOutput {
            queue,
            high_water: self.frame_size * 8,
            _stream: stream,
        }))
    }
}

// ---------------------------------------------------------------------------
// CpalInput
// ---------------------------------------------------------------------------

struct CpalInput {
    rx: mpsc::Receiver<Vec<f32>>,
    pending: Vec<i16>,
    frame_size: usize,
    /// Keeps the cpal stream alive; dropping it stops capture.
    _stream: cpal::Stream,
}

impl AudioInput for CpalInput {
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<Vec<i16>>, AudioError> {
        let deadline = Instant::now() + timeout;
        while self.pending.len() < self.frame_size {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.rx.recv_timeout(remaining) {
                Ok(buffer) => self
                    .pending
                    .extend(buffer.iter().map(|&s| f32_to_i16(s))),
                Err(mpsc::RecvTimeoutError::Timeout) => return Ok(None),
                Err(mpsc::RecvTimeoutError::Disconnected) => return Err(AudioError::Closed),
            }
        }
        Ok(Some(self.pending.drain(..self.frame_size).collect()))
    }
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32_767.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

// ---------------------------------------------------------------------------
// CpalOutput
// ---------------------------------------------------------------------------

/// How long a single frame write may stall before playback is abandoned.
const WRITE_STALL_TIMEOUT: Duration = Duration::from_secs(1);

struct CpalOutput {
    queue: Arc<Mutex<VecDeque<i16>>>,
    /// Maximum queued samples before `write_frame` applies backpressure.
    high_water: usize,
    _stream: cpal::Stream,
}

impl CpalOutput {
    fn queued(&self) -> usize {
        match self.queue.lock() {
            Ok(q) => q.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl AudioOutput for CpalOutput {
    fn write_frame(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        let deadline = Instant::now() + WRITE_STALL_TIMEOUT;
        while self.queued() > self.high_water {
            if Instant::now() >= deadline {
                return Err(AudioError::PlaybackFailed(
                    "output queue stalled — device stopped draining".into(),
                ));
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        match self.queue.lock() {
            Ok(mut q) => q.extend(samples.iter().copied()),
            Err(poisoned) => poisoned.into_inner().extend(samples.iter().copied()),
        }
        Ok(())
    }

    fn drain(&mut self, timeout: Duration) -> Result<(), AudioError> {
        let deadline = Instant::now() + timeout;
        while self.queued() > 0 {
            if Instant::now() >= deadline {
                return Err(AudioError::PlaybackFailed(
                    "output queue failed to drain before teardown".into(),
                ));
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockAudioDevice  (test double)
// ---------------------------------------------------------------------------

/// In-memory [`AudioDevice`] for tests: input frames come from a queue the
/// test fills, written frames accumulate where the test can inspect them.
#[cfg(test)]
pub struct MockAudioDevice {
    /// Frames [`AudioInput::read_frame`] will return, oldest first.
    pub input_frames: Arc<Mutex<VecDeque<Vec<i16>>>>,
    /// Every frame written through [`AudioOutput::write_frame`].
    pub written: Arc<Mutex<Vec<Vec<i16>>>>,
    /// When `true`, `open_output` fails — exercises the stuck-PTT paths.
    pub fail_output: bool,
}

#[cfg(test)]
impl MockAudioDevice {
    pub fn new() -> Self {
        Self {
            input_frames: Arc::new(Mutex::new(VecDeque::new())),
            written: Arc::new(Mutex::new(Vec::new())),
            fail_output: false,
        }
    }

    pub fn push_input_frame(&self, frame: Vec<i16>) {
        self.input_frames.lock().unwrap().push_back(frame);
    }

    pub fn written_frames(&self) -> Vec<Vec<i16>> {
        self.written.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl AudioDevice for MockAudioDevice {
    fn open_input(&self) -> Result<Box<dyn AudioInput>, AudioError> {
        Ok(Box::new(MockInput {
            frames: Arc::clone(&self.input_frames),
        }))
    }

    fn open_output(&self) -> Result<Box<dyn AudioOutput>, AudioError> {
        if self.fail_output {
            return Err(AudioError::PlaybackFailed("mock output disabled".into()));
        }
        Ok(Box::new(MockOutput {
            written: Arc::clone(&self.written),
        }))
    }
}

#[cfg(test)]
struct MockInput {
    frames: Arc<Mutex<VecDeque<Vec<i16>>>>,
}

#[cfg(test)]
impl AudioInput for MockInput {
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<Vec<i16>>, AudioError> {
        if let Some(frame) = self.frames.lock().unwrap().pop_front() {
            return Ok(Some(frame));
        }
        // Behave like a quiet device: block for the timeout, deliver nothing.
        std::thread::sleep(timeout);
        Ok(None)
    }
}

#[cfg(test)]
struct MockOutput {
    written: Arc<Mutex<Vec<Vec<i16>>>>,
}

#[cfg(test)]
impl AudioOutput for MockOutput {
    fn write_frame(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        self.written.lock().unwrap().push(samples.to_vec());
        Ok(())
    }

    fn drain(&mut self, _timeout: Duration) -> Result<(), AudioError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
