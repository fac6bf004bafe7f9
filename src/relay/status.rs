//! Status snapshots and the external control surface.
//!
//! The dashboard transport (whatever serves it) is a separate concern; the
//! core's contract is a [`StatusSnapshot`] published over a
//! `tokio::sync::watch` channel on every state change, and a
//! [`RepeaterHandle`] through which the transport injects control requests.

use serde::Serialize;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

use crate::ident::IdentScheduler;
use crate::relay::machine::RelayEvent;
use crate::relay::state::{RelayMode, RepeaterState};

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the repeater for the dashboard.
///
/// Times are exposed as plain second counts (age / countdown) so the
/// consumer can format them however it likes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    /// Debounced carrier-detect reading.
    pub carrier_active: bool,
    /// Current relay mode.
    pub mode: RelayMode,
    /// Capture gain.
    pub input_gain: f32,
    /// Playback gain.
    pub output_gain: f32,
    /// Whether automatic identification is active.
    pub ident_enabled: bool,
    /// Seconds between automatic identifications.
    pub ident_interval_secs: u64,
    /// Whether real carrier-detect/PTT hardware is attached.
    pub hardware_connected: bool,
    /// Completed receptions since startup.
    pub total_receptions: u64,
    /// Retransmissions since startup.
    pub total_transmissions: u64,
    /// Seconds since startup.
    pub uptime_secs: u64,
    /// Seconds since the last reception/transmission, if any.
    pub last_activity_secs: Option<u64>,
    /// Seconds until the next scheduled identification; `None` when
    /// automatic identification is disabled.
    pub next_ident_secs: Option<u64>,
}

impl StatusSnapshot {
    /// Capture the current state.
    pub fn capture(state: &RepeaterState, scheduler: &IdentScheduler, now: Instant) -> Self {
        let next_ident_secs = state
            .ident_enabled
            .then(|| scheduler.seconds_until_due(now, state.ident_interval));

        Self {
            carrier_active: state.carrier,
            mode: state.mode,
            input_gain: state.input_gain,
            output_gain: state.output_gain,
            ident_enabled: state.ident_enabled,
            ident_interval_secs: state.ident_interval.as_secs(),
            hardware_connected: state.hardware_connected,
            total_receptions: state.stats.total_receptions,
            total_transmissions: state.stats.total_transmissions,
            uptime_secs: state.stats.uptime_secs(now),
            last_activity_secs: state.stats.last_activity_secs(now),
            next_ident_secs,
        }
    }

    /// Serialise for the dashboard transport.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// ControlRequest
// ---------------------------------------------------------------------------

/// Control operations the external transport may request.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    /// Set the capture gain (clamped to `[0.0, 2.0]`).
    SetInputGain(f32),
    /// Set the playback gain (clamped to `[0.0, 2.0]`).
    SetOutputGain(f32),
    /// Enable or disable automatic identification.
    SetIdentEnabled(bool),
    /// Change the identification interval (seconds).
    SetIdentInterval(u64),
    /// Identify now, if the channel is idle.
    TriggerIdent,
}

// ---------------------------------------------------------------------------
// RepeaterHandle
// ---------------------------------------------------------------------------

/// Cloneable handle the dashboard transport uses to observe and control the
/// repeater.
#[derive(Clone)]
pub struct RepeaterHandle {
    events: mpsc::Sender<RelayEvent>,
    status: watch::Receiver<StatusSnapshot>,
}

impl RepeaterHandle {
    /// Pair a control sender with the status watch.
    pub fn new(events: mpsc::Sender<RelayEvent>, status: watch::Receiver<StatusSnapshot>) -> Self {
        Self { events, status }
    }

    /// The most recently published snapshot.
    pub fn status(&self) -> StatusSnapshot {
        self.status.borrow().clone()
    }

    /// A watch receiver for consumers that want change notifications.
    pub fn watch(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.clone()
    }

    /// Set the capture gain.  Returns `false` when the relay has shut down.
    pub async fn set_input_gain(&self, gain: f32) -> bool {
        self.send(ControlRequest::SetInputGain(gain)).await
    }

    /// Set the playback gain.
    pub async fn set_output_gain(&self, gain: f32) -> bool {
        self.send(ControlRequest::SetOutputGain(gain)).await
    }

    /// Enable or disable automatic identification.
    pub async fn set_ident_enabled(&self, enabled: bool) -> bool {
        self.send(ControlRequest::SetIdentEnabled(enabled)).await
    }

    /// Change the identification interval.
    pub async fn set_ident_interval(&self, secs: u64) -> bool {
        self.send(ControlRequest::SetIdentInterval(secs)).await
    }

    /// Request an immediate identification.
    pub async fn trigger_ident(&self) -> bool {
        self.send(ControlRequest::TriggerIdent).await
    }

    async fn send(&self, request: ControlRequest) -> bool {
        self.events
            .send(RelayEvent::Control(request))
            .await
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepeaterConfig;
    use std::time::Duration;

    fn state_at(now: Instant) -> RepeaterState {
        RepeaterState::new(&RepeaterConfig::default(), true, now)
    }

    #[test]
    fn snapshot_reflects_state() {
        let t0 = Instant::now();
        let mut state = state_at(t0);
        state.mode = RelayMode::Transmitting;
        state.carrier = true;
        state.stats.total_receptions = 3;
        state.stats.total_transmissions = 2;
        state.stats.last_activity = Some(t0);

        let scheduler = IdentScheduler::new(t0);
        let now = t0 + Duration::from_secs(45);
        let snap = StatusSnapshot::capture(&state, &scheduler, now);

        assert!(snap.carrier_active);
        assert_eq!(snap.mode, RelayMode::Transmitting);
        assert_eq!(snap.input_gain, 1.0);
        assert_eq!(snap.output_gain, 1.2);
        assert!(snap.ident_enabled);
        assert_eq!(snap.ident_interval_secs, 600);
        assert!(snap.hardware_connected);
        assert_eq!(snap.total_receptions, 3);
        assert_eq!(snap.total_transmissions, 2);
        assert_eq!(snap.uptime_secs, 45);
        assert_eq!(snap.last_activity_secs, Some(45));
        assert_eq!(snap.next_ident_secs, Some(555));
    }

    #[test]
    fn disabled_ident_hides_the_countdown() {
        let t0 = Instant::now();
        let mut state = state_at(t0);
        state.ident_enabled = false;

        let snap = StatusSnapshot::capture(&state, &IdentScheduler::new(t0), t0);
        assert_eq!(snap.next_ident_secs, None);
    }

    #[test]
    fn snapshot_serialises_to_json() {
        let t0 = Instant::now();
        let snap = StatusSnapshot::capture(&state_at(t0), &IdentScheduler::new(t0), t0);

        let json = snap.to_json().expect("serialise");
        assert!(json.contains("\"mode\":\"Idle\""));
        assert!(json.contains("\"total_receptions\":0"));
        assert!(json.contains("\"hardware_connected\":true"));
    }

    /// Handle methods translate into control events on the relay channel.
    #[tokio::test]
    async fn handle_forwards_control_requests() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (_status_tx, status_rx) = watch::channel(StatusSnapshot::default());
        let handle = RepeaterHandle::new(events_tx, status_rx);

        assert!(handle.set_input_gain(0.7).await);
        assert!(handle.trigger_ident().await);

        match events_rx.recv().await {
            Some(RelayEvent::Control(ControlRequest::SetInputGain(g))) => assert_eq!(g, 0.7),
            other => panic!("unexpected event: {other:?}"),
        }
        match events_rx.recv().await {
            Some(RelayEvent::Control(ControlRequest::TriggerIdent)) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }

    /// A shut-down relay makes control sends report failure instead of
    /// panicking.
    #[tokio::test]
    async fn handle_reports_closed_channel() {
        let (events_tx, events_rx) = mpsc::channel(8);
        let (_status_tx, status_rx) = watch::channel(StatusSnapshot::default());
        drop(events_rx);

        let handle = RepeaterHandle::new(events_tx, status_rx);
        assert!(!handle.set_output_gain(1.0).await);
    }
}
