//! CPAL output backend
//!
//! ```text
//! ┌──────────────────┐   push()   ┌─────────────────────┐
//! │   MixerState     │───────────►│ per-deck SPSC queue │
//! │ (control thread) │            └──────────┬──────────┘
//! └──────────────────┘                       │ pop() at block start
//!         │ Relaxed atomics                  ▼
//!         │ (rate, gain, EQ,      ┌─────────────────────┐
//!         │  crossfader, master)  │  CPAL audio thread  │
//!         └──────────────────────►│ (owns AudioEngine)  │
//!                                 └─────────────────────┘
//! ```
//!
//! The `AudioEngine` is moved into the stream callback; nothing on the
//! audio thread takes a lock.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig, SupportedStreamConfig};

use super::config::AudioConfig;
use super::error::{AudioError, AudioResult};
use crate::config::MixerConfig;
use crate::engine::{AudioEngine, Clock, MAX_BUFFER_SIZE};
use crate::state::MixerState;
use crate::types::StereoBuffer;

/// Keeps the output stream alive; drop it to stop audio
pub struct AudioHandle {
    _stream: Stream,
    device_name: String,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Negotiated device sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Requested buffer size in frames
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        self.buffer_size as f32 / self.sample_rate as f32 * 1000.0
    }
}

/// A running console: the stream handle and the control half
pub struct AudioSystem {
    pub handle: AudioHandle,
    pub mixer: MixerState,
}

/// Names of the output devices on the default host
pub fn output_device_names() -> AudioResult<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::Enumeration(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

fn find_device(config: &AudioConfig) -> AudioResult<cpal::Device> {
    let host = cpal::default_host();
    match &config.device {
        Some(name) => {
            let mut devices = host
                .output_devices()
                .map_err(|e| AudioError::Enumeration(e.to_string()))?;
            devices
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| AudioError::DeviceNotFound(name.clone()))
        }
        None => host.default_output_device().ok_or(AudioError::NoDefaultDevice),
    }
}

/// Pick an f32 output configuration, preferring stereo at the requested rate
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(SupportedStreamConfig, u32)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .collect();

    if supported.is_empty() {
        return Err(AudioError::UnsupportedFormat(
            "device has no f32 output configuration".to_string(),
        ));
    }

    let target = config.sample_rate;
    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        target >= c.min_sample_rate().0 && target <= c.max_sample_rate().0
    };

    let best = supported
        .iter()
        .find(|c| c.channels() == 2 && in_range(*c))
        .or_else(|| supported.iter().find(|c| c.channels() >= 2 && in_range(*c)))
        .or_else(|| supported.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported.first())
        .ok_or_else(|| AudioError::ConfigError("no suitable output configuration".to_string()))?;

    let sample_rate = if in_range(best) {
        cpal::SampleRate(target)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (decks will resample)",
            target,
            fallback.0
        );
        fallback
    };

    let buffer_size = config.buffer_size.frames(MAX_BUFFER_SIZE as u32);
    Ok((best.clone().with_sample_rate(sample_rate), buffer_size))
}

/// Fill an interleaved device buffer from the engine
///
/// Callbacks larger than `MAX_BUFFER_SIZE` frames are rendered in chunks.
/// Stereo devices get a straight copy; mono devices get the mid signal and
/// channels beyond the second are silent.
pub(crate) fn render_interleaved(
    engine: &mut AudioEngine,
    master: &mut StereoBuffer,
    data: &mut [f32],
    channels: usize,
) {
    let channels = channels.max(1);
    for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
        let frames = chunk.len() / channels;
        master.set_len_from_capacity(frames);
        engine.process(master);

        if channels == 2 {
            chunk[..frames * 2].copy_from_slice(master.as_interleaved());
            continue;
        }
        for (frame, sample) in chunk.chunks_mut(channels).zip(master.iter()) {
            if channels == 1 {
                frame[0] = sample.mid();
                continue;
            }
            frame[0] = sample.left;
            frame[1] = sample.right;
            for ch in frame.iter_mut().skip(2) {
                *ch = 0.0;
            }
        }
    }
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: AudioEngine,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut master = StereoBuffer::silence(MAX_BUFFER_SIZE);

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                render_interleaved(&mut engine, &mut master, data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

/// Open the output device and start the console
///
/// The mixer system is built at the negotiated device rate; the returned
/// `MixerState` is the only control surface.
pub fn start_audio_system(config: &MixerConfig, clock: Arc<dyn Clock>) -> AudioResult<AudioSystem> {
    let device = find_device(&config.audio)?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported, buffer_size) = get_output_config(&device, &config.audio)?;
    let sample_rate = supported.sample_rate().0;
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        buffer_size as f32 / sample_rate as f32 * 1000.0
    );

    let (mixer, engine) = MixerState::new(config, sample_rate, clock);
    let stream = build_output_stream(&device, &stream_config, engine)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioSystem {
        handle: AudioHandle {
            _stream: stream,
            device_name,
            sample_rate,
            buffer_size,
        },
        mixer,
    })
}
