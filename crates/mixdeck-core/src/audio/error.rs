//! Audio backend error types

use thiserror::Error;

/// Errors that can occur while opening the output
#[derive(Error, Debug)]
pub enum AudioError {
    /// Host reports no default output
    #[error("No default audio output device")]
    NoDefaultDevice,

    /// Configured device name not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Host could not enumerate devices
    #[error("Failed to enumerate audio devices: {0}")]
    Enumeration(String),

    /// Failed to query device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// Device has no f32 output configuration
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
