//! Mixer configuration
//!
//! Stored as YAML at [`default_config_path`]. Every field has a default, so a
//! partial file (or none at all) is valid.
//!
//! ```yaml
//! audio:
//!   device: null
//!   sample_rate: 48000
//!   buffer_size: Default
//! mixer:
//!   deck_volume: 0.8
//!   crossfader: 0.5
//!   master_volume: 0.8
//! notify_rate_hz: 60.0
//! tap_window: 1024
//! ```

mod io;
mod paths;

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::engine::DEFAULT_TAP_WINDOW;

pub use io::{load_config, save_config};
pub use paths::default_config_path;

/// Default notification rate for continuous controls
pub const DEFAULT_NOTIFY_RATE_HZ: f64 = 60.0;

/// Initial fader positions of a fresh console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerDefaults {
    /// Channel gain of both decks (0.0 to 1.0)
    pub deck_volume: f64,
    /// 0.0 = deck A only, 1.0 = deck B only
    pub crossfader: f64,
    pub master_volume: f64,
}

impl Default for MixerDefaults {
    fn default() -> Self {
        Self {
            deck_volume: 0.8,
            crossfader: 0.5,
            master_volume: 0.8,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub audio: AudioConfig,
    pub mixer: MixerDefaults,
    /// Upper bound on change notifications per second for continuous
    /// controls; 0 disables throttling
    pub notify_rate_hz: f64,
    /// Samples per waveform analysis window
    pub tap_window: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            mixer: MixerDefaults::default(),
            notify_rate_hz: DEFAULT_NOTIFY_RATE_HZ,
            tap_window: DEFAULT_TAP_WINDOW,
        }
    }
}
