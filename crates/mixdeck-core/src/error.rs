//! Engine and mixer error types
//!
//! None of these errors is fatal: a rejected action leaves the mixer state
//! unchanged, and a rendering fault silences only the affected deck.

use thiserror::Error;

use crate::types::DeckSlot;

/// PCM data could not be turned into a playable buffer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("buffer has no channels")]
    NoChannels,

    #[error("buffer has a sample rate of 0 Hz")]
    ZeroSampleRate,

    #[error("buffer contains no samples")]
    Empty,

    #[error("{samples} samples do not divide into {channels} channels")]
    RaggedFrames { samples: usize, channels: u16 },

    #[error("non-finite sample at index {index}")]
    NonFiniteSample { index: usize },
}

/// Sample rate or channel layout the output cannot render
///
/// `Copy` so the audio thread can record it without allocating.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMismatchError {
    #[error("unsupported channel layout: {channels} channels")]
    ChannelLayout { channels: u16 },

    #[error("cannot resample {source_rate}Hz to device rate {device_rate}Hz")]
    SampleRate { source_rate: u32, device_rate: u32 },
}

/// A parameter value that cannot be applied, even after clamping
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidParameterError {
    #[error("{name} must be a finite number, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    #[error("{0} has no track loaded")]
    NoTrack(DeckSlot),

    #[error("{slot} has no cue point with id {id}")]
    UnknownCue { slot: DeckSlot, id: u64 },
}

impl InvalidParameterError {
    /// Reject NaN and infinities; everything else is clamped by the caller
    pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<f64, Self> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Self::NotFinite { name, value })
        }
    }
}

/// Errors returned by mixer actions
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixerError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("format mismatch: {0}")]
    FormatMismatch(#[from] FormatMismatchError),

    #[error("invalid parameter: {0}")]
    InvalidParameter(#[from] InvalidParameterError),
}

/// Result type for mixer actions
pub type MixerResult<T> = Result<T, MixerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_finite() {
        assert_eq!(InvalidParameterError::check_finite("volume", 0.5), Ok(0.5));
        assert!(InvalidParameterError::check_finite("volume", f64::NAN).is_err());
        assert!(InvalidParameterError::check_finite("volume", f64::INFINITY).is_err());
    }

    #[test]
    fn test_error_messages() {
        let err = MixerError::from(DecodeError::RaggedFrames { samples: 5, channels: 2 });
        assert_eq!(err.to_string(), "decode failed: 5 samples do not divide into 2 channels");

        let err = MixerError::from(InvalidParameterError::NoTrack(DeckSlot::A));
        assert_eq!(err.to_string(), "invalid parameter: Deck A has no track loaded");
    }
}
