//! Relay mode and shared repeater state.
//!
//! [`RelayMode`] is the central invariant of the whole system: the relay is
//! in exactly one mode at any instant, and only the state machine task
//! writes it.  [`RepeaterState`] bundles the mode with everything the
//! status snapshot needs; [`SharedState`] (`Arc<Mutex<RepeaterState>>`) is
//! cheap to clone and safe to share across threads.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::RepeaterConfig;

// ---------------------------------------------------------------------------
// RelayMode
// ---------------------------------------------------------------------------

/// States of the relay.
///
/// The state machine transitions are:
///
/// ```text
/// Idle ──carrier asserted──▶ Receiving
///      ◀─carrier dropped──── (session frozen, transmit scheduled)
/// Idle ──transmit ready────▶ Transmitting ──playback done──▶ Idle
/// Idle ──identification────▶ Announcing  ──playback done──▶ Idle
/// ```
///
/// Carrier activity during `Transmitting` or `Announcing` is ignored; an
/// identification request during `Receiving` or `Transmitting` is deferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum RelayMode {
    /// Channel quiet, transmitter unkeyed.
    #[default]
    Idle,

    /// Carrier present; captured frames are appended to the session.
    Receiving,

    /// Replaying a received message with PTT keyed.
    Transmitting,

    /// Playing the station identification with PTT keyed.
    Announcing,
}

impl RelayMode {
    /// Returns `true` while the transmitter must be keyed.
    ///
    /// PTT follows this exactly: asserted on entering a keyed mode,
    /// released on leaving it.
    ///
    /// ```
    /// use simplex_repeater::relay::RelayMode;
    ///
    /// assert!(!RelayMode::Idle.keys_transmitter());
    /// assert!(!RelayMode::Receiving.keys_transmitter());
    /// assert!(RelayMode::Transmitting.keys_transmitter());
    /// assert!(RelayMode::Announcing.keys_transmitter());
    /// ```
    pub fn keys_transmitter(&self) -> bool {
        matches!(self, RelayMode::Transmitting | RelayMode::Announcing)
    }

    /// Returns `true` when the relay is doing anything besides waiting.
    pub fn is_active(&self) -> bool {
        !matches!(self, RelayMode::Idle)
    }

    /// A short human-readable label for logs and the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            RelayMode::Idle => "idle",
            RelayMode::Receiving => "receiving",
            RelayMode::Transmitting => "transmitting",
            RelayMode::Announcing => "announcing",
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Activity counters, monotonically updated, never reset while running.
#[derive(Debug, Clone)]
pub struct Statistics {
    /// Completed carrier-detect → recording starts.
    pub total_receptions: u64,
    /// Retransmissions started.
    pub total_transmissions: u64,
    /// Process start, for uptime reporting.
    pub uptime_start: Instant,
    /// Most recent reception or transmission start.
    pub last_activity: Option<Instant>,
}

impl Statistics {
    /// Fresh counters starting at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            total_receptions: 0,
            total_transmissions: 0,
            uptime_start: now,
            last_activity: None,
        }
    }

    /// Whole seconds since startup.
    pub fn uptime_secs(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.uptime_start).as_secs()
    }

    /// Whole seconds since the last activity, if any.
    pub fn last_activity_secs(&self, now: Instant) -> Option<u64> {
        self.last_activity
            .map(|t| now.saturating_duration_since(t).as_secs())
    }
}

// ---------------------------------------------------------------------------
// RepeaterState
// ---------------------------------------------------------------------------

/// Shared repeater state — the single source of truth for the snapshot.
///
/// Held behind [`SharedState`].  The state machine mutates it; the capture
/// loop reads `input_gain` per frame; the status snapshot reads everything.
pub struct RepeaterState {
    /// Current relay mode.  Written only by the state machine.
    pub mode: RelayMode,

    /// Debounced carrier-detect reading, mirrored on every edge.
    pub carrier: bool,

    /// Gain applied to captured frames, clamped to `[0.0, 2.0]`.
    pub input_gain: f32,

    /// Gain applied to played frames, clamped to `[0.0, 2.0]`.
    pub output_gain: f32,

    /// Whether the identification interval timer is active.
    pub ident_enabled: bool,

    /// Interval between automatic identifications.
    pub ident_interval: Duration,

    /// Whether real carrier-detect/PTT hardware is attached.
    pub hardware_connected: bool,

    /// Activity counters.
    pub stats: Statistics,
}

impl RepeaterState {
    /// Build the initial state from configuration.
    pub fn new(config: &RepeaterConfig, hardware_connected: bool, now: Instant) -> Self {
        Self {
            mode: RelayMode::Idle,
            carrier: false,
            input_gain: config.levels.input_gain,
            output_gain: config.levels.output_gain,
            ident_enabled: config.ident.enabled,
            ident_interval: config.ident.interval(),
            hardware_connected,
            stats: Statistics::new(now),
        }
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`RepeaterState`].
///
/// Cheap to clone (`Arc` clone).  Lock for a short critical section; do
/// **not** hold the lock across `.await` points.
pub type SharedState = Arc<Mutex<RepeaterState>>;

/// Construct a new [`SharedState`] from configuration.
pub fn new_shared_state(
    config: &RepeaterConfig,
    hardware_connected: bool,
    now: Instant,
) -> SharedState {
    Arc::new(Mutex::new(RepeaterState::new(
        config,
        hardware_connected,
        now,
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
