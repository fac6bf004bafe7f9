//! Configuration module for the simplex repeater.
//!
//! Provides `RepeaterConfig` (top-level settings), sub-configs for each
//! subsystem, `AppPaths` for cross-platform data directories, and TOML
//! persistence via `RepeaterConfig::load` / `RepeaterConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AudioSettings, HardwareSettings, IdentSettings, LevelSettings, RelaySettings, RepeaterConfig,
};
