//! Relay orchestration — the state machine, shared state, and the
//! status/control surface.
//!
//! One task owns every mode transition: carrier edges, timer ticks,
//! playback completions and control requests all arrive as [`RelayEvent`]s
//! on a single channel consumed by [`RelayStateMachine`].  Everything the
//! dashboard needs leaves the core as a [`StatusSnapshot`] on a watch
//! channel; everything it may change comes back in as a [`ControlRequest`]
//! through [`RepeaterHandle`].

pub mod machine;
pub mod state;
pub mod status;

pub use machine::{RelayEvent, RelayStateMachine};
pub use state::{new_shared_state, RelayMode, RepeaterState, SharedState, Statistics};
pub use status::{ControlRequest, RepeaterHandle, StatusSnapshot};
