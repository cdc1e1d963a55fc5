//! Audio output configuration

use serde::{Deserialize, Serialize};

/// Default buffer size when no preference is specified (frames)
///
/// 512 frames is ~10.7ms at 48kHz, safe on most systems.
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Smallest buffer size accepted for a fixed request (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Default output sample rate (48kHz)
///
/// If the device doesn't support it, the backend falls back to the device's
/// maximum rate and decks resample on the fly.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// [`DEFAULT_BUFFER_SIZE`]
    #[default]
    Default,
    /// A specific size in frames (clamped to the supported range)
    Fixed(u32),
}

impl BufferSize {
    /// Frames to request from the device
    pub fn frames(&self, max: u32) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(MIN_BUFFER_SIZE, max),
        }
    }
}

/// Output device settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name as reported by the host (None = system default)
    pub device: Option<String>,
    /// Requested sample rate
    pub sample_rate: u32,
    pub buffer_size: BufferSize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: BufferSize::default(),
        }
    }
}

impl AudioConfig {
    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_frames() {
        assert_eq!(BufferSize::Default.frames(8192), DEFAULT_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(16).frames(8192), MIN_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(1 << 20).frames(8192), 8192);
        assert_eq!(BufferSize::Fixed(256).frames(8192), 256);
    }

    #[test]
    fn test_with_device() {
        let config = AudioConfig::default().with_device("USB Audio");
        assert_eq!(config.device.as_deref(), Some("USB Audio"));
        assert_eq!(config.buffer_size, BufferSize::Default);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
    }
}
