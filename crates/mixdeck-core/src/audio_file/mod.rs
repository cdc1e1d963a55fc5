//! Decoded audio buffers
//!
//! File decoding belongs to the library collaborator, which hands the engine
//! raw interleaved PCM ([`PcmData`]). [`DecodedBuffer::decode`] validates that
//! PCM into an immutable buffer the rendering path can read without checks.

use crate::error::{DecodeError, FormatMismatchError};
use crate::types::{Sample, StereoSample, TrackId};

/// Largest supported ratio between source and device sample rate (either way)
///
/// Covers 8kHz material on a 48kHz device and 384kHz material on 48kHz.
pub const MAX_RESAMPLE_RATIO: f64 = 8.0;

/// Raw interleaved PCM as produced by a decoder
#[derive(Debug, Clone, PartialEq)]
pub struct PcmData {
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples `[c0, c1, .., c0, c1, ..]`
    pub samples: Vec<Sample>,
}

impl PcmData {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<Sample>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }
}

/// Playable, immutable audio for one track
///
/// Wrapped in `basedrop::Shared` once loaded so the audio thread can drop its
/// reference without freeing memory in the callback.
#[derive(Debug)]
pub struct DecodedBuffer {
    track_id: TrackId,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    samples: Vec<Sample>,
}

impl DecodedBuffer {
    /// Validate PCM data into a playable buffer
    pub fn decode(track_id: TrackId, pcm: PcmData) -> Result<Self, DecodeError> {
        let PcmData {
            sample_rate,
            channels,
            samples,
        } = pcm;

        if channels == 0 {
            return Err(DecodeError::NoChannels);
        }
        if sample_rate == 0 {
            return Err(DecodeError::ZeroSampleRate);
        }
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        if samples.len() % channels as usize != 0 {
            return Err(DecodeError::RaggedFrames {
                samples: samples.len(),
                channels,
            });
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(DecodeError::NonFiniteSample { index });
        }

        let frames = samples.len() / channels as usize;
        Ok(Self {
            track_id,
            sample_rate,
            channels,
            frames,
            samples,
        })
    }

    pub fn track_id(&self) -> TrackId {
        self.track_id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Length in frames (one sample per channel)
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Check that the output can render this buffer at `device_rate`
    ///
    /// Mono and stereo are supported; the rate ratio must stay within
    /// [`MAX_RESAMPLE_RATIO`].
    pub fn check_format(&self, device_rate: u32) -> Result<(), FormatMismatchError> {
        if self.channels > 2 {
            return Err(FormatMismatchError::ChannelLayout {
                channels: self.channels,
            });
        }
        let ratio = self.sample_rate as f64 / device_rate.max(1) as f64;
        if !(1.0 / MAX_RESAMPLE_RATIO..=MAX_RESAMPLE_RATIO).contains(&ratio) {
            return Err(FormatMismatchError::SampleRate {
                source_rate: self.sample_rate,
                device_rate,
            });
        }
        Ok(())
    }

    /// Read one frame as stereo; mono is duplicated, frames past the end are silent
    #[inline]
    pub fn frame(&self, index: usize) -> StereoSample {
        if index >= self.frames {
            return StereoSample::silence();
        }
        match self.channels {
            1 => StereoSample::mono(self.samples[index]),
            _ => {
                let base = index * self.channels as usize;
                StereoSample::new(self.samples[base], self.samples[base + 1])
            }
        }
    }

    /// Linear interpolation between neighbouring frames at a fractional position
    #[inline]
    pub fn frame_at(&self, position: f64) -> StereoSample {
        let index = position as usize;
        let frac = (position - index as f64) as Sample;
        let a = self.frame(index);
        if frac <= 0.0 {
            return a;
        }
        let b = self.frame(index + 1);
        StereoSample::new(
            a.left + (b.left - a.left) * frac,
            a.right + (b.right - a.right) * frac,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_mono() {
        let buffer = DecodedBuffer::decode(1, PcmData::new(4, 1, vec![0.0, 0.25, 0.5, 0.75])).unwrap();
        assert_eq!(buffer.frames(), 4);
        assert_eq!(buffer.duration_seconds(), 1.0);
        assert_eq!(buffer.frame(1), StereoSample::mono(0.25));
        assert_eq!(buffer.frame(4), StereoSample::silence());
    }

    #[test]
    fn test_decode_rejects_bad_pcm() {
        assert_eq!(
            DecodedBuffer::decode(1, PcmData::new(48000, 0, vec![0.0])).unwrap_err(),
            DecodeError::NoChannels
        );
        assert_eq!(
            DecodedBuffer::decode(1, PcmData::new(0, 2, vec![0.0, 0.0])).unwrap_err(),
            DecodeError::ZeroSampleRate
        );
        assert_eq!(
            DecodedBuffer::decode(1, PcmData::new(48000, 2, vec![])).unwrap_err(),
            DecodeError::Empty
        );
        assert_eq!(
            DecodedBuffer::decode(1, PcmData::new(48000, 2, vec![0.0, 0.0, 0.0])).unwrap_err(),
            DecodeError::RaggedFrames { samples: 3, channels: 2 }
        );
        assert_eq!(
            DecodedBuffer::decode(1, PcmData::new(48000, 1, vec![0.0, f32::NAN])).unwrap_err(),
            DecodeError::NonFiniteSample { index: 1 }
        );
    }

    #[test]
    fn test_interpolated_read() {
        let buffer = DecodedBuffer::decode(1, PcmData::new(48000, 2, vec![0.0, 1.0, 1.0, 0.0])).unwrap();
        let mid = buffer.frame_at(0.5);
        assert!((mid.left - 0.5).abs() < 1e-6);
        assert!((mid.right - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_check_format() {
        let stereo = DecodedBuffer::decode(1, PcmData::new(44100, 2, vec![0.0; 8])).unwrap();
        assert!(stereo.check_format(48000).is_ok());

        let surround = DecodedBuffer::decode(1, PcmData::new(48000, 6, vec![0.0; 12])).unwrap();
        assert_eq!(
            surround.check_format(48000),
            Err(FormatMismatchError::ChannelLayout { channels: 6 })
        );

        let tiny = DecodedBuffer::decode(1, PcmData::new(1000, 1, vec![0.0; 4])).unwrap();
        assert_eq!(
            tiny.check_format(48000),
            Err(FormatMismatchError::SampleRate { source_rate: 1000, device_rate: 48000 })
        );
    }
}
