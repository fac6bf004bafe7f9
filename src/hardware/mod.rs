//! Carrier-detect / PTT hardware over a CM108-family USB sound fob.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 CarrierPtt (trait)                   │
//! │                                                      │
//! │   Cm108Gateway ── rusb ──▶ HID interface             │
//! │     set_ptt        SET_REPORT control transfer       │
//! │     poll_carrier   4-byte interrupt IN report        │
//! │                                                      │
//! │   DisconnectedGateway — failing no-ops, keeps the    │
//! │   repeater alive without a fob                       │
//! └──────────────────────────────────────────────────────┘
//!            ▲
//!            │ polled every ~20 ms
//!   CarrierMonitor (dedicated OS thread, edge-triggered)
//! ```

pub mod gateway;
pub mod monitor;

pub use gateway::{CarrierPtt, Cm108Gateway, DisconnectedGateway, HardwareError};
pub use monitor::CarrierMonitor;

// test-only re-export so other modules' test suites can import MockGateway
// without `use crate::hardware::gateway::MockGateway`.
#[cfg(test)]
pub use gateway::MockGateway;
