//! Repeater settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::audio::clamp_gain;

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioSettings
// ---------------------------------------------------------------------------

/// Settings for the audio path shared by capture and playback.
///
/// Both directions run at the same fixed format: mono, 16-bit signed linear
/// PCM, frame-granular reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Sample rate in Hz for both capture and playback.
    pub sample_rate: u32,
    /// Samples per frame; every stream read/write moves one frame.
    pub frame_size: usize,
    /// Number of frames of pre-roll retained while the channel is quiet.
    pub pre_roll_chunks: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            frame_size: 512,
            pre_roll_chunks: 15,
        }
    }
}

// ---------------------------------------------------------------------------
// LevelSettings
// ---------------------------------------------------------------------------

/// Linear gain applied on capture (input) and playback (output).
///
/// Both gains are clamped to `[0.0, 2.0]` on load and on every runtime
/// change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelSettings {
    /// Gain applied to every captured frame before buffering.
    pub input_gain: f32,
    /// Gain applied to every frame written during retransmission.
    pub output_gain: f32,
}

impl Default for LevelSettings {
    fn default() -> Self {
        Self {
            input_gain: 1.0,
            output_gain: 1.2,
        }
    }
}

// ---------------------------------------------------------------------------
// IdentSettings
// ---------------------------------------------------------------------------

/// Station-identification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentSettings {
    /// Whether the interval timer triggers identification automatically.
    pub enabled: bool,
    /// Seconds between automatic identifications.
    pub interval_secs: u64,
    /// Path to the identification audio clip (any format ffmpeg decodes).
    pub clip_path: PathBuf,
}

impl Default for IdentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 600,
            clip_path: PathBuf::from("station_id.mp3"),
        }
    }
}

impl IdentSettings {
    /// The configured interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ---------------------------------------------------------------------------
// HardwareSettings
// ---------------------------------------------------------------------------

/// USB identifiers and polling cadence for the CM108 HID gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareSettings {
    /// USB vendor id of the sound fob (C-Media CM108: `0x0d8c`).
    pub vendor_id: u16,
    /// USB product id of the sound fob.
    pub product_id: u16,
    /// Milliseconds between carrier-detect polls.
    pub poll_interval_ms: u64,
    /// Timeout in milliseconds for a single interrupt read.
    pub read_timeout_ms: u64,
}

impl Default for HardwareSettings {
    fn default() -> Self {
        Self {
            vendor_id: 0x0d8c,
            product_id: 0x0012,
            poll_interval_ms: 20,
            read_timeout_ms: 50,
        }
    }
}

impl HardwareSettings {
    /// Poll cadence as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Interrupt-read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// RelaySettings
// ---------------------------------------------------------------------------

/// Timing knobs of the receive → transmit hand-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Milliseconds between PTT assertion and the first playback write.
    pub ptt_lead_ms: u64,
    /// Milliseconds between carrier drop and the start of retransmission.
    pub tx_delay_ms: u64,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            ptt_lead_ms: 100,
            tx_delay_ms: 100,
        }
    }
}

impl RelaySettings {
    /// PTT lead time as a [`Duration`].
    pub fn ptt_lead(&self) -> Duration {
        Duration::from_millis(self.ptt_lead_ms)
    }

    /// Transmit hand-off delay as a [`Duration`].
    pub fn tx_delay(&self) -> Duration {
        Duration::from_millis(self.tx_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// RepeaterConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level repeater configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use simplex_repeater::config::RepeaterConfig;
///
/// // Load (returns Default when file is missing)
/// let config = RepeaterConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepeaterConfig {
    /// Audio format shared by capture and playback.
    pub audio: AudioSettings,
    /// Input/output gain levels.
    pub levels: LevelSettings,
    /// Station-identification timer and clip.
    pub ident: IdentSettings,
    /// CM108 gateway identifiers and polling cadence.
    pub hardware: HardwareSettings,
    /// Receive/transmit hand-off timing.
    pub relay: RelaySettings,
}

impl RepeaterConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(RepeaterConfig::default())` when the file does not exist
    /// yet (first-run scenario) so callers never need to special-case a
    /// missing file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    ///
    /// Gains are clamped to their valid range on the way in, so a
    /// hand-edited file cannot push levels outside `[0.0, 2.0]`.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.levels.input_gain = clamp_gain(config.levels.input_gain);
        config.levels.output_gain = clamp_gain(config.levels.output_gain);
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `RepeaterConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = RepeaterConfig::default();
        original.save_to(&path).expect("save");

        let loaded = RepeaterConfig::load_from(&path).expect("load");

        // AudioSettings
        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(original.audio.frame_size, loaded.audio.frame_size);
        assert_eq!(original.audio.pre_roll_chunks, loaded.audio.pre_roll_chunks);

        // LevelSettings
        assert_eq!(original.levels.input_gain, loaded.levels.input_gain);
        assert_eq!(original.levels.output_gain, loaded.levels.output_gain);

        // IdentSettings
        assert_eq!(original.ident.enabled, loaded.ident.enabled);
        assert_eq!(original.ident.interval_secs, loaded.ident.interval_secs);
        assert_eq!(original.ident.clip_path, loaded.ident.clip_path);

        // HardwareSettings
        assert_eq!(original.hardware.vendor_id, loaded.hardware.vendor_id);
        assert_eq!(original.hardware.product_id, loaded.hardware.product_id);
        assert_eq!(
            original.hardware.poll_interval_ms,
            loaded.hardware.poll_interval_ms
        );

        // RelaySettings
        assert_eq!(original.relay.ptt_lead_ms, loaded.relay.ptt_lead_ms);
        assert_eq!(original.relay.tx_delay_ms, loaded.relay.tx_delay_ms);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = RepeaterConfig::load_from(&path).expect("should not error");
        let default = RepeaterConfig::default();

        assert_eq!(config.audio.sample_rate, default.audio.sample_rate);
        assert_eq!(config.levels.output_gain, default.levels.output_gain);
        assert_eq!(config.ident.interval_secs, default.ident.interval_secs);
        assert_eq!(config.hardware.vendor_id, default.hardware.vendor_id);
    }

    /// Verify the reference default values.
    #[test]
    fn default_values() {
        let cfg = RepeaterConfig::default();

        assert_eq!(cfg.audio.sample_rate, 44_100);
        assert_eq!(cfg.audio.frame_size, 512);
        assert_eq!(cfg.audio.pre_roll_chunks, 15);
        assert_eq!(cfg.levels.input_gain, 1.0);
        assert_eq!(cfg.levels.output_gain, 1.2);
        assert!(cfg.ident.enabled);
        assert_eq!(cfg.ident.interval_secs, 600);
        assert_eq!(cfg.ident.clip_path, PathBuf::from("station_id.mp3"));
        assert_eq!(cfg.hardware.vendor_id, 0x0d8c);
        assert_eq!(cfg.hardware.product_id, 0x0012);
        assert_eq!(cfg.hardware.poll_interval_ms, 20);
        assert_eq!(cfg.relay.ptt_lead_ms, 100);
        assert_eq!(cfg.relay.tx_delay_ms, 100);
    }

    /// Out-of-range gains in a hand-edited file are clamped on load.
    #[test]
    fn load_clamps_gains() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("hot.toml");

        let mut cfg = RepeaterConfig::default();
        cfg.levels.input_gain = 9.5;
        cfg.levels.output_gain = -3.0;
        cfg.save_to(&path).expect("save");

        let loaded = RepeaterConfig::load_from(&path).expect("load");
        assert_eq!(loaded.levels.input_gain, 2.0);
        assert_eq!(loaded.levels.output_gain, 0.0);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = RepeaterConfig::default();
        cfg.audio.pre_roll_chunks = 30;
        cfg.levels.output_gain = 0.8;
        cfg.ident.enabled = false;
        cfg.ident.interval_secs = 900;
        cfg.ident.clip_path = PathBuf::from("/srv/id/callsign.ogg");
        cfg.hardware.read_timeout_ms = 100;
        cfg.relay.tx_delay_ms = 250;

        cfg.save_to(&path).expect("save");
        let loaded = RepeaterConfig::load_from(&path).expect("load");

        assert_eq!(loaded.audio.pre_roll_chunks, 30);
        assert_eq!(loaded.levels.output_gain, 0.8);
        assert!(!loaded.ident.enabled);
        assert_eq!(loaded.ident.interval_secs, 900);
        assert_eq!(loaded.ident.clip_path, PathBuf::from("/srv/id/callsign.ogg"));
        assert_eq!(loaded.hardware.read_timeout_ms, 100);
        assert_eq!(loaded.relay.tx_delay_ms, 250);
    }

    /// Duration helpers reflect the stored millisecond/second values.
    #[test]
    fn duration_helpers() {
        let cfg = RepeaterConfig::default();
        assert_eq!(cfg.ident.interval(), Duration::from_secs(600));
        assert_eq!(cfg.hardware.poll_interval(), Duration::from_millis(20));
        assert_eq!(cfg.hardware.read_timeout(), Duration::from_millis(50));
        assert_eq!(cfg.relay.ptt_lead(), Duration::from_millis(100));
        assert_eq!(cfg.relay.tx_delay(), Duration::from_millis(100));
    }
}
