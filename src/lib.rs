//! Simplex repeater core — record on carrier detect, retransmit on PTT.
//!
//! The repeater serves one half-duplex radio link through a CM108-style USB
//! sound fob: the fob's HID interface carries the carrier-detect (COS) input
//! and the PTT output, while its sound card carries receive and transmit
//! audio.  A continuously running capture loop keeps a short pre-roll of the
//! most recent audio so nothing is lost while carrier detect settles; once
//! the carrier drops, the recorded message is replayed with PTT keyed.  A
//! station-identification clip is played on a timer or on demand.
//!
//! # Subsystems
//!
//! - [`hardware`] — CM108 HID gateway (carrier detect + PTT) and the
//!   carrier polling thread.
//! - [`audio`] — capture/playback streams, pre-roll ring, gain scaling,
//!   fallback tone synthesis.
//! - [`relay`] — the state machine coordinating receive, transmit, and
//!   identification, plus the status/control surface.
//! - [`ident`] — identification scheduling and announcement decoding.
//! - [`config`] — TOML settings and platform paths.

pub mod audio;
pub mod config;
pub mod hardware;
pub mod ident;
pub mod relay;
