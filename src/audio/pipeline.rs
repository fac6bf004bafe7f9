//! Capture loop and playback passes.
//!
//! The capture loop is the one process-lifetime audio task: it keeps the
//! input stream open, applies input gain, and feeds the pre-roll ring on
//! every frame — the ring never pauses, whatever the relay is doing.  A
//! [`RecordingSession`] is opened and closed by [`CaptureCommand`]s from
//! the state machine; because commands are handled between frame reads on
//! the same thread, the session's first chunks are exactly the pre-roll
//! contents at that instant, with no gap or duplicate before the live
//! frames that follow.
//!
//! Playback is transient: [`play_chunks`] opens the output stream, writes a
//! silence pad, the gained chunks, a trailing pad, and drains.  The caller
//! owns PTT and must release it whether playback succeeds or not.

use std::sync::mpsc::{self, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::audio::buffer::PreRollBuffer;
use crate::audio::chunk::{AudioChunk, RecordingSession};
use crate::audio::device::{AudioDevice, AudioError, AudioInput, AudioOutput};
use crate::audio::gain::adjust_volume;
use crate::config::AudioSettings;
use crate::relay::SharedState;

/// Bounded wait for one capture frame; keeps the loop responsive to
/// commands and shutdown.
const FRAME_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// How long everything queued for playback may take to reach the device.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Stream (re)open attempts before giving up.
const OPEN_ATTEMPTS: u32 = 5;

/// First retry backoff; doubles per attempt.
const OPEN_BACKOFF: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// CaptureCommand / CaptureHandle
// ---------------------------------------------------------------------------

/// Commands the state machine sends to the capture loop.
#[derive(Debug)]
pub enum CaptureCommand {
    /// Snapshot the pre-roll into a fresh [`RecordingSession`] and start
    /// appending captured frames to it.
    Begin,
    /// Freeze the active session and hand it back.
    End {
        reply: oneshot::Sender<RecordingSession>,
    },
    /// Stop the loop (process teardown).
    Stop,
}

/// Sending side of the capture command channel.
#[derive(Clone)]
pub struct CaptureHandle {
    tx: mpsc::Sender<CaptureCommand>,
}

impl CaptureHandle {
    /// Start recording.  Returns `false` if the capture loop is gone.
    pub fn begin(&self) -> bool {
        self.tx.send(CaptureCommand::Begin).is_ok()
    }

    /// Stop recording; the frozen session arrives on the returned receiver.
    ///
    /// Returns `None` if the capture loop is gone.
    pub fn end(&self) -> Option<oneshot::Receiver<RecordingSession>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(CaptureCommand::End { reply }).ok()?;
        Some(rx)
    }

    /// Ask the loop to exit.
    pub fn stop(&self) {
        let _ = self.tx.send(CaptureCommand::Stop);
    }
}

/// Create the capture command channel.
pub fn capture_channel() -> (CaptureHandle, mpsc::Receiver<CaptureCommand>) {
    let (tx, rx) = mpsc::channel();
    (CaptureHandle { tx }, rx)
}

// ---------------------------------------------------------------------------
// Capture loop
// ---------------------------------------------------------------------------

/// Run the continuous capture loop until stopped.
///
/// Intended for a dedicated OS thread.  Stream faults are retried with a
/// backoff; the loop only halts (with a prominent log) when the input
/// stream cannot be reopened after [`OPEN_ATTEMPTS`] tries.
pub fn run_capture(
    device: Arc<dyn AudioDevice>,
    state: SharedState,
    commands: mpsc::Receiver<CaptureCommand>,
    settings: AudioSettings,
) {
    let mut pre_roll = PreRollBuffer::new(settings.pre_roll_chunks);
    let mut session: Option<RecordingSession> = None;

    let mut input = match open_input_with_retry(device.as_ref()) {
        Some(input) => input,
        None => {
            log::error!("capture: could not open input stream, capture disabled");
            return;
        }
    };

    log::info!(
        "capture started ({} Hz, {}-sample frames, {} frames pre-roll)",
        settings.sample_rate,
        settings.frame_size,
        settings.pre_roll_chunks
    );

    loop {
        // Commands are handled between frame reads, so a Begin snapshot is
        // contiguous with the next captured frame.
        loop {
            match commands.try_recv() {
                Ok(CaptureCommand::Begin) => {
                    session = Some(RecordingSession::from_pre_roll(&pre_roll));
                }
                Ok(CaptureCommand::End { reply }) => {
                    let frozen = session.take().unwrap_or_default();
                    let _ = reply.send(frozen);
                }
                Ok(CaptureCommand::Stop) | Err(TryRecvError::Disconnected) => {
                    log::info!("capture stopped");
                    return;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        match input.read_frame(FRAME_READ_TIMEOUT) {
            Ok(Some(samples)) => {
                let gain = lock_state(&state).input_gain;
                let chunk = AudioChunk::new(adjust_volume(&samples, gain));
                if let Some(active) = session.as_mut() {
                    active.push(chunk.clone());
                }
                pre_roll.push(chunk);
            }
            Ok(None) => {
                // Quiet driver or overflow recovery; nothing to buffer.
            }
            Err(e) => {
                log::warn!("capture: stream fault ({e}), reopening");
                match open_input_with_retry(device.as_ref()) {
                    Some(reopened) => input = reopened,
                    None => {
                        log::error!("capture: input stream lost for good, capture halted");
                        return;
                    }
                }
            }
        }
    }
}

fn lock_state(state: &SharedState) -> std::sync::MutexGuard<'_, crate::relay::RepeaterState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn open_input_with_retry(device: &dyn AudioDevice) -> Option<Box<dyn AudioInput>> {
    let mut backoff = OPEN_BACKOFF;
    for attempt in 1..=OPEN_ATTEMPTS {
        match device.open_input() {
            Ok(input) => return Some(input),
            Err(e) => {
                log::warn!("capture: open attempt {attempt}/{OPEN_ATTEMPTS} failed: {e}");
                std::thread::sleep(backoff);
                backoff *= 2;
            }
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

/// Play `chunks` with `gain` applied, bracketed by silence pads.
///
/// Blocking; run it on a blocking-capable thread.  An empty chunk list is a
/// fast no-op that still opens and pads the stream.  Total failure to open
/// the output surfaces as [`AudioError::PlaybackFailed`]; the caller must
/// release PTT either way.
pub fn play_chunks(
    device: &dyn AudioDevice,
    chunks: &[AudioChunk],
    gain: f32,
    frame_size: usize,
) -> Result<(), AudioError> {
    let mut output = open_output_with_retry(device)?;

    let silence = vec![0i16; frame_size];
    output.write_frame(&silence)?;
    for chunk in chunks {
        output.write_frame(&adjust_volume(chunk.samples(), gain))?;
    }
    output.write_frame(&silence)?;
    output.drain(DRAIN_TIMEOUT)?;
    Ok(())
}

fn open_output_with_retry(device: &dyn AudioDevice) -> Result<Box<dyn AudioOutput>, AudioError> {
    let mut backoff = OPEN_BACKOFF;
    let mut last_error = None;
    for attempt in 1..=OPEN_ATTEMPTS {
        match device.open_output() {
            Ok(output) => return Ok(output),
            Err(e) => {
                log::warn!("playback: open attempt {attempt}/{OPEN_ATTEMPTS} failed: {e}");
                last_error = Some(e);
                std::thread::sleep(backoff);
                backoff *= 2;
            }
        }
    }
    Err(AudioError::PlaybackFailed(format!(
        "output stream would not open: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
