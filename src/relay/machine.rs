//! Relay state machine — drives the receive → transmit → identify cycle.
//!
//! [`RelayStateMachine`] owns every [`RelayMode`] transition.  All inputs
//! arrive as [`RelayEvent`]s over one mpsc channel: carrier edges from the
//! polling thread, timer ticks, completion notices from playback tasks, and
//! control requests from the dashboard.  Because a single task consumes the
//! channel, the mode can never be in two states at once and PTT is always
//! paired — asserted when a keyed mode is entered, released on the matching
//! completion event, whatever happened in between.
//!
//! # Event flow
//!
//! ```text
//! CarrierChanged(true)   └─▶ snapshot pre-roll, mode = Receiving
//! CarrierChanged(false)  └─▶ freeze session, mode = Idle,
//!                            TransmitReady after the hand-off delay
//! TransmitReady          └─▶ PTT on, mode = Transmitting,
//!                            playback after the PTT lead
//! PlaybackFinished       └─▶ PTT off, mode = Idle, session discarded
//! IdentTick / TriggerIdent, channel idle
//!                        └─▶ PTT on, mode = Announcing, clip or tone
//! AnnouncementFinished   └─▶ PTT off, mode = Idle
//! Shutdown               └─▶ capture stopped, PTT off, loop exits
//! ```
//!
//! Carrier activity observed while Transmitting or Announcing is ignored —
//! a half-duplex relay cannot record while it is keyed, and losing that
//! traffic is the accepted trade-off.  Identification requests while the
//! channel is busy are deferred, not queued: the interval timer simply
//! retries on a later tick.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};

use crate::audio::{play_chunks, AudioDevice, CaptureHandle, RecordingSession};
use crate::audio::clamp_gain;
use crate::config::RepeaterConfig;
use crate::hardware::CarrierPtt;
use crate::ident::{AnnouncementSource, IdentScheduler};

use super::state::{RelayMode, SharedState};
use super::status::{ControlRequest, StatusSnapshot};

// ---------------------------------------------------------------------------
// RelayEvent
// ---------------------------------------------------------------------------

/// Inputs consumed by the state machine, in arrival order.
#[derive(Debug)]
pub enum RelayEvent {
    /// The carrier-detect line changed (edge-triggered).
    CarrierChanged(bool),
    /// The post-carrier hand-off delay elapsed; start retransmitting.
    TransmitReady,
    /// A retransmission playback task ended (success or failure).
    PlaybackFinished,
    /// An identification playback task ended (success or failure).
    AnnouncementFinished,
    /// Periodic tick for the identification timer and status refresh.
    IdentTick,
    /// A request from the control surface.
    Control(ControlRequest),
    /// Process teardown.
    Shutdown,
}

// ---------------------------------------------------------------------------
// RelayStateMachine
// ---------------------------------------------------------------------------

/// The orchestrator task.  Create with [`RelayStateMachine::new`], then
/// spawn [`run`](Self::run) on the runtime.
pub struct RelayStateMachine {
    state: SharedState,
    gateway: Arc<dyn CarrierPtt>,
    device: Arc<dyn AudioDevice>,
    capture: CaptureHandle,
    scheduler: IdentScheduler,
    /// Frozen session waiting for its transmit window.
    pending_session: Option<RecordingSession>,
    status_tx: watch::Sender<StatusSnapshot>,
    /// Clone handed to transient tasks so completions re-enter the loop.
    events_tx: mpsc::Sender<RelayEvent>,
    config: RepeaterConfig,
}

impl RelayStateMachine {
    /// Wire up the orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`     — shared state also read by capture and the snapshot.
    /// * `gateway`   — PTT output (carrier input arrives as events).
    /// * `device`    — audio device used by transient playback tasks.
    /// * `capture`   — command channel into the capture loop.
    /// * `status_tx` — watch channel the dashboard observes.
    /// * `events_tx` — sender side of the loop's own event channel.
    pub fn new(
        state: SharedState,
        gateway: Arc<dyn CarrierPtt>,
        device: Arc<dyn AudioDevice>,
        capture: CaptureHandle,
        status_tx: watch::Sender<StatusSnapshot>,
        events_tx: mpsc::Sender<RelayEvent>,
        config: RepeaterConfig,
    ) -> Self {
        Self {
            state,
            gateway,
            device,
            capture,
            scheduler: IdentScheduler::new(Instant::now()),
            pending_session: None,
            status_tx,
            events_tx,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until a [`RelayEvent::Shutdown`] arrives or the channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<RelayEvent>) {
        self.publish();

        while let Some(event) = events.recv().await {
            match event {
                RelayEvent::CarrierChanged(active) => self.handle_carrier(active).await,
                RelayEvent::TransmitReady => self.handle_transmit_ready(),
                RelayEvent::PlaybackFinished => self.finish_transmission(),
                RelayEvent::AnnouncementFinished => self.finish_announcement(),
                RelayEvent::IdentTick => self.handle_ident_tick(),
                RelayEvent::Control(request) => self.handle_control(request),
                RelayEvent::Shutdown => break,
            }
            self.publish();
        }

        self.shutdown();
    }

    // -----------------------------------------------------------------------
    // Carrier handling
    // -----------------------------------------------------------------------

    async fn handle_carrier(&mut self, active: bool) {
        let mode = {
            let mut st = self.state.lock().unwrap();
            st.carrier = active;
            st.mode
        };

        if active {
            match mode {
                RelayMode::Idle => self.begin_receiving(),
                RelayMode::Receiving => {}
                RelayMode::Transmitting | RelayMode::Announcing => {
                    log::debug!("carrier asserted while {}, ignored", mode.label());
                }
            }
        } else if mode == RelayMode::Receiving {
            self.end_receiving().await;
        }
    }

    fn begin_receiving(&mut self) {
        if !self.capture.begin() {
            log::error!("capture loop unavailable, cannot record");
            return;
        }

        let mut st = self.state.lock().unwrap();
        st.mode = RelayMode::Receiving;
        st.stats.total_receptions += 1;
        st.stats.last_activity = Some(Instant::now());
        drop(st);

        log::info!("carrier detected, recording");
    }

    async fn end_receiving(&mut self) {
        self.state.lock().unwrap().mode = RelayMode::Idle;

        let session = match self.capture.end() {
            Some(reply) => reply.await.unwrap_or_default(),
            None => RecordingSession::default(),
        };
        log::info!(
            "carrier dropped, {} chunks recorded ({:.2}s)",
            session.len(),
            session.duration_secs(self.config.audio.sample_rate)
        );
        self.pending_session = Some(session);

        let events = self.events_tx.clone();
        let delay = self.config.relay.tx_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(RelayEvent::TransmitReady).await;
        });
    }

    // -----------------------------------------------------------------------
    // Retransmission
    // -----------------------------------------------------------------------

    fn handle_transmit_ready(&mut self) {
        let Some(session) = self.pending_session.take() else {
            return;
        };

        let output_gain = {
            let mut st = self.state.lock().unwrap();
            if st.mode != RelayMode::Idle {
                // Carrier came back (or an announcement started) during the
                // hand-off delay; this message loses its window.
                log::debug!(
                    "transmit window lost while {}, discarding {} chunks",
                    st.mode.label(),
                    session.len()
                );
                return;
            }
            st.mode = RelayMode::Transmitting;
            st.stats.total_transmissions += 1;
            st.output_gain
        };

        self.set_ptt(true);
        log::info!("retransmitting {} chunks", session.len());

        let device = Arc::clone(&self.device);
        let frame_size = self.config.audio.frame_size;
        let lead = self.config.relay.ptt_lead();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(lead).await;
            let chunks = session.into_chunks();
            let played = tokio::task::spawn_blocking(move || {
                play_chunks(device.as_ref(), &chunks, output_gain, frame_size)
            })
            .await;

            match played {
                Ok(Ok(())) => log::info!("retransmission complete"),
                Ok(Err(e)) => log::error!("retransmission failed: {e}"),
                Err(e) => log::error!("playback task panicked: {e}"),
            }
            // Must reach the loop on every exit path so PTT is released.
            let _ = events.send(RelayEvent::PlaybackFinished).await;
        });
    }

    fn finish_transmission(&mut self) {
        if self.state.lock().unwrap().mode != RelayMode::Transmitting {
            return;
        }
        // Release strictly after the last write, before leaving the keyed
        // mode — PTT is never asserted outside Transmitting/Announcing.
        self.set_ptt(false);
        self.state.lock().unwrap().mode = RelayMode::Idle;
    }

    // -----------------------------------------------------------------------
    // Identification
    // -----------------------------------------------------------------------

    fn handle_ident_tick(&mut self) {
        let (enabled, interval) = {
            let st = self.state.lock().unwrap();
            (st.ident_enabled, st.ident_interval)
        };
        if self.scheduler.check_due(Instant::now(), enabled, interval) {
            self.start_announcement(false);
        }
    }

    fn start_announcement(&mut self, manual: bool) {
        let output_gain = {
            let mut st = self.state.lock().unwrap();
            if st.mode != RelayMode::Idle {
                // Deferred, not queued: the interval timer retries on a
                // later tick, a manual request is simply dropped.
                if manual {
                    log::info!("identification request deferred while {}", st.mode.label());
                }
                return;
            }
            st.mode = RelayMode::Announcing;
            st.output_gain
        };

        // The interval measures start-to-start.
        self.scheduler.mark(Instant::now());
        self.set_ptt(true);
        log::info!(
            "{} identification started",
            if manual { "manual" } else { "scheduled" }
        );

        let device = Arc::clone(&self.device);
        let clip = self.config.ident.clip_path.clone();
        let sample_rate = self.config.audio.sample_rate;
        let frame_size = self.config.audio.frame_size;
        let lead = self.config.relay.ptt_lead();
        let events = self.events_tx.clone();

        tokio::spawn(async move {
            tokio::time::sleep(lead).await;
            let played = tokio::task::spawn_blocking(move || {
                let source = AnnouncementSource::build(&clip, sample_rate, frame_size);
                let gain = source.playback_gain(output_gain);
                play_chunks(device.as_ref(), source.chunks(), gain, frame_size)
            })
            .await;

            match played {
                Ok(Ok(())) => log::info!("identification complete"),
                Ok(Err(e)) => log::error!("identification playback failed: {e}"),
                Err(e) => log::error!("identification task panicked: {e}"),
            }
            let _ = events.send(RelayEvent::AnnouncementFinished).await;
        });
    }

    fn finish_announcement(&mut self) {
        if self.state.lock().unwrap().mode != RelayMode::Announcing {
            return;
        }
        self.set_ptt(false);
        self.state.lock().unwrap().mode = RelayMode::Idle;
    }

    // -----------------------------------------------------------------------
    // Control surface
    // -----------------------------------------------------------------------

    fn handle_control(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::SetInputGain(gain) => {
                self.state.lock().unwrap().input_gain = clamp_gain(gain);
            }
            ControlRequest::SetOutputGain(gain) => {
                self.state.lock().unwrap().output_gain = clamp_gain(gain);
            }
            ControlRequest::SetIdentEnabled(enabled) => {
                self.state.lock().unwrap().ident_enabled = enabled;
            }
            ControlRequest::SetIdentInterval(secs) => {
                self.state.lock().unwrap().ident_interval = std::time::Duration::from_secs(secs);
            }
            ControlRequest::TriggerIdent => self.start_announcement(true),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_ptt(&self, active: bool) {
        // Best-effort: a failed transfer is logged and retried implicitly on
        // the next PTT call, never allowed to wedge the state machine.
        if let Err(e) = self.gateway.set_ptt(active) {
            log::warn!(
                "PTT {} failed: {e}",
                if active { "assert" } else { "release" }
            );
        }
    }

    fn publish(&self) {
        let snapshot = {
            let st = self.state.lock().unwrap();
            StatusSnapshot::capture(&st, &self.scheduler, Instant::now())
        };
        self.status_tx.send_replace(snapshot);
    }

    fn shutdown(&mut self) {
        self.capture.stop();
        self.state.lock().unwrap().mode = RelayMode::Idle;
        // PTT must never stay asserted past teardown, whatever was running.
        self.set_ptt(false);
        self.publish();
        log::info!("relay state machine stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::device::MockAudioDevice;
    use crate::audio::pipeline::{capture_channel, CaptureCommand};
    use crate::audio::AudioChunk;
    use crate::hardware::MockGateway;
    use crate::relay::new_shared_state;
    use std::path::PathBuf;
    use std::sync::{mpsc as std_mpsc, Mutex};
    use std::time::Duration;

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    fn test_config() -> RepeaterConfig {
        let mut cfg = RepeaterConfig::default();
        cfg.audio.sample_rate = 8_000;
        cfg.audio.frame_size = 4;
        cfg.audio.pre_roll_chunks = 3;
        // Short but wide enough that mode polling cannot miss a window.
        cfg.relay.ptt_lead_ms = 30;
        cfg.relay.tx_delay_ms = 10;
        // Announcements exercise the fallback-tone path.
        cfg.ident.clip_path = PathBuf::from("/nonexistent/station_id.mp3");
        cfg
    }

    /// Stand-in for the capture loop: answers `End` with the canned chunks
    /// if a `Begin` preceded it.
    fn spawn_session_responder(
        rx: std_mpsc::Receiver<CaptureCommand>,
        live_chunks: Vec<AudioChunk>,
    ) -> std::thread::JoinHandle<()> {
        std::thread::spawn(move || {
            let mut active = false;
            while let Ok(command) = rx.recv() {
                match command {
                    CaptureCommand::Begin => active = true,
                    CaptureCommand::End { reply } => {
                        let mut session = RecordingSession::default();
                        if active {
                            for chunk in &live_chunks {
                                session.push(chunk.clone());
                            }
                        }
                        active = false;
                        let _ = reply.send(session);
                    }
                    CaptureCommand::Stop => break,
                }
            }
        })
    }

    struct Harness {
        events: mpsc::Sender<RelayEvent>,
        state: SharedState,
        gateway: Arc<MockGateway>,
        written: Arc<Mutex<Vec<Vec<i16>>>>,
        machine: tokio::task::JoinHandle<()>,
        responder: std::thread::JoinHandle<()>,
    }

    impl Harness {
        fn start(config: RepeaterConfig, live_chunks: Vec<AudioChunk>) -> Self {
            let state = new_shared_state(&config, true, Instant::now());
            let gateway = Arc::new(MockGateway::new());
            let device = Arc::new(MockAudioDevice::new());
            let written = Arc::clone(&device.written);

            let (capture_handle, capture_rx) = capture_channel();
            let responder = spawn_session_responder(capture_rx, live_chunks);

            let (events_tx, events_rx) = mpsc::channel(32);
            let (status_tx, _status_rx) = watch::channel(StatusSnapshot::default());

            let machine = RelayStateMachine::new(
                Arc::clone(&state),
                Arc::clone(&gateway) as Arc<dyn CarrierPtt>,
                device as Arc<dyn AudioDevice>,
                capture_handle,
                status_tx,
                events_tx.clone(),
                config,
            );
            let machine = tokio::spawn(machine.run(events_rx));

            Self {
                events: events_tx,
                state,
                gateway,
                written,
                machine,
                responder,
            }
        }

        fn mode(&self) -> RelayMode {
            self.state.lock().unwrap().mode
        }

        async fn send(&self, event: RelayEvent) {
            self.events.send(event).await.expect("machine alive");
        }

        /// Poll until `mode` is reached; panics on timeout.
        async fn wait_for_mode(&self, mode: RelayMode) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while self.mode() != mode {
                assert!(Instant::now() < deadline, "timed out waiting for {mode:?}");
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }

        async fn stop(self) {
            self.send(RelayEvent::Shutdown).await;
            self.machine.await.unwrap();
            self.responder.join().unwrap();
        }
    }

    fn chunk(v: i16) -> AudioChunk {
        AudioChunk::new(vec![v; 4])
    }

    // -----------------------------------------------------------------------
    // Receive / transmit cycle
    // -----------------------------------------------------------------------

    /// Carrier assertion from Idle starts a reception and counts it.
    #[tokio::test(flavor = "multi_thread")]
    async fn carrier_assert_enters_receiving() {
        let h = Harness::start(test_config(), vec![chunk(1)]);

        h.send(RelayEvent::CarrierChanged(true)).await;
        h.wait_for_mode(RelayMode::Receiving).await;

        {
            let st = h.state.lock().unwrap();
            assert!(st.carrier);
            assert_eq!(st.stats.total_receptions, 1);
            assert!(st.stats.last_activity.is_some());
        }
        assert!(h.gateway.ptt_calls().is_empty(), "receive must not key PTT");

        h.stop().await;
    }

    /// The full cycle: record, hand off, retransmit with PTT around the
    /// audio, return to Idle with the session discarded.
    #[tokio::test(flavor = "multi_thread")]
    async fn full_cycle_transmits_and_releases_ptt() {
        let h = Harness::start(test_config(), vec![chunk(100), chunk(-50)]);

        h.send(RelayEvent::CarrierChanged(true)).await;
        h.wait_for_mode(RelayMode::Receiving).await;
        h.send(RelayEvent::CarrierChanged(false)).await;

        h.wait_for_mode(RelayMode::Transmitting).await;
        h.wait_for_mode(RelayMode::Idle).await;

        assert_eq!(h.gateway.ptt_calls(), vec![true, false]);

        // Silence pad, both chunks at output gain 1.2, silence pad.
        let written = h.written.lock().unwrap().clone();
        assert_eq!(written.len(), 4);
        assert_eq!(written[0], vec![0; 4]);
        assert_eq!(written[1], vec![120; 4]);
        assert_eq!(written[2], vec![-60; 4]);
        assert_eq!(written[3], vec![0; 4]);

        {
            let st = h.state.lock().unwrap();
            assert_eq!(st.stats.total_receptions, 1);
            assert_eq!(st.stats.total_transmissions, 1);
        }

        h.stop().await;
    }

    /// A carrier blip with nothing recorded still transmits — as a fast
    /// no-op of pads only, not an error.
    #[tokio::test(flavor = "multi_thread")]
    async fn empty_session_transmits_as_noop() {
        let h = Harness::start(test_config(), Vec::new());

        h.send(RelayEvent::CarrierChanged(true)).await;
        h.wait_for_mode(RelayMode::Receiving).await;
        h.send(RelayEvent::CarrierChanged(false)).await;
        h.wait_for_mode(RelayMode::Transmitting).await;
        h.wait_for_mode(RelayMode::Idle).await;

        assert_eq!(h.gateway.ptt_calls(), vec![true, false]);
        let written = h.written.lock().unwrap().clone();
        assert_eq!(written, vec![vec![0; 4], vec![0; 4]]);

        h.stop().await;
    }

    /// A stray TransmitReady with no pending session changes nothing.
    #[tokio::test(flavor = "multi_thread")]
    async fn transmit_ready_without_session_is_ignored() {
        let h = Harness::start(test_config(), vec![chunk(1)]);

        h.send(RelayEvent::TransmitReady).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(h.mode(), RelayMode::Idle);
        assert!(h.gateway.ptt_calls().is_empty());
        assert!(h.written.lock().unwrap().is_empty());

        h.stop().await;
    }

    // -----------------------------------------------------------------------
    // Identification
    // -----------------------------------------------------------------------

    /// Manual identification from Idle: PTT around the fallback tone, back
    /// to Idle.
    #[tokio::test(flavor = "multi_thread")]
    async fn manual_ident_plays_tone_and_releases_ptt() {
        let h = Harness::start(test_config(), Vec::new());

        h.send(RelayEvent::Control(ControlRequest::TriggerIdent)).await;
        h.wait_for_mode(RelayMode::Announcing).await;
        h.wait_for_mode(RelayMode::Idle).await;

        assert_eq!(h.gateway.ptt_calls(), vec![true, false]);
        // 2 s of tone at 8 kHz in 4-sample frames, plus two silence pads.
        let written = h.written.lock().unwrap().clone();
        assert_eq!(written.len(), 2 + 16_000 / 4);

        // Identification is not a retransmission.
        assert_eq!(h.state.lock().unwrap().stats.total_transmissions, 0);

        h.stop().await;
    }

    /// Carrier activity while announcing is ignored: no session starts, the
    /// announcement runs to completion.
    #[tokio::test(flavor = "multi_thread")]
    async fn carrier_during_announcement_is_ignored() {
        let mut cfg = test_config();
        // Stretch the PTT lead so the announcement window is easy to hit.
        cfg.relay.ptt_lead_ms = 200;
        let h = Harness::start(cfg, vec![chunk(1)]);

        h.send(RelayEvent::Control(ControlRequest::TriggerIdent)).await;
        h.wait_for_mode(RelayMode::Announcing).await;

        h.send(RelayEvent::CarrierChanged(true)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(h.mode(), RelayMode::Announcing);
        assert_eq!(h.state.lock().unwrap().stats.total_receptions, 0);
        // The carrier flag itself is still tracked for the dashboard.
        assert!(h.state.lock().unwrap().carrier);

        h.wait_for_mode(RelayMode::Idle).await;
        assert_eq!(h.gateway.ptt_calls(), vec![true, false]);

        h.stop().await;
    }

    /// Identification requested while receiving is deferred, and the
    /// receive/transmit cycle is untouched.
    #[tokio::test(flavor = "multi_thread")]
    async fn ident_deferred_while_receiving() {
        let h = Harness::start(test_config(), vec![chunk(5)]);

        h.send(RelayEvent::CarrierChanged(true)).await;
        h.wait_for_mode(RelayMode::Receiving).await;

        h.send(RelayEvent::Control(ControlRequest::TriggerIdent)).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(h.mode(), RelayMode::Receiving);
        assert!(h.gateway.ptt_calls().is_empty());

        // The cycle then completes normally.
        h.send(RelayEvent::CarrierChanged(false)).await;
        h.wait_for_mode(RelayMode::Idle).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.wait_for_mode(RelayMode::Idle).await;
        assert_eq!(h.state.lock().unwrap().stats.total_transmissions, 1);

        h.stop().await;
    }

    /// A tick with the interval elapsed starts an announcement; a tick
    /// before that does nothing.
    #[tokio::test(flavor = "multi_thread")]
    async fn ident_tick_honours_interval() {
        let mut cfg = test_config();
        cfg.ident.interval_secs = 0; // immediately due
        let h = Harness::start(cfg, Vec::new());

        h.send(RelayEvent::IdentTick).await;
        h.wait_for_mode(RelayMode::Announcing).await;
        h.wait_for_mode(RelayMode::Idle).await;
        assert_eq!(h.gateway.ptt_calls(), vec![true, false]);

        h.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ident_tick_before_interval_does_nothing() {
        let h = Harness::start(test_config(), Vec::new());

        h.send(RelayEvent::IdentTick).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(h.mode(), RelayMode::Idle);
        assert!(h.gateway.ptt_calls().is_empty());

        h.stop().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disabled_ident_never_fires() {
        let mut cfg = test_config();
        cfg.ident.interval_secs = 0;
        cfg.ident.enabled = false;
        let h = Harness::start(cfg, Vec::new());

        h.send(RelayEvent::IdentTick).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(h.mode(), RelayMode::Idle);
        assert!(h.gateway.ptt_calls().is_empty());

        h.stop().await;
    }

    // -----------------------------------------------------------------------
    // Control surface
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread")]
    async fn control_clamps_gains() {
        let h = Harness::start(test_config(), Vec::new());

        h.send(RelayEvent::Control(ControlRequest::SetInputGain(5.0))).await;
        h.send(RelayEvent::Control(ControlRequest::SetOutputGain(-1.0))).await;
        h.send(RelayEvent::Control(ControlRequest::SetIdentInterval(900))).await;
        h.send(RelayEvent::Control(ControlRequest::SetIdentEnabled(false))).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        {
            let st = h.state.lock().unwrap();
            assert_eq!(st.input_gain, 2.0);
            assert_eq!(st.output_gain, 0.0);
            assert_eq!(st.ident_interval, Duration::from_secs(900));
            assert!(!st.ident_enabled);
        }

        h.stop().await;
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Shutdown stops the capture loop and ends with PTT released.
    #[tokio::test(flavor = "multi_thread")]
    async fn shutdown_releases_ptt_and_stops_capture() {
        let h = Harness::start(test_config(), Vec::new());

        h.send(RelayEvent::Shutdown).await;
        let Harness {
            state,
            gateway,
            machine,
            responder,
            ..
        } = h;
        machine.await.unwrap();
        responder.join().unwrap();

        assert_eq!(gateway.ptt_calls().last(), Some(&false));
        assert_eq!(state.lock().unwrap().mode, RelayMode::Idle);
    }
}
