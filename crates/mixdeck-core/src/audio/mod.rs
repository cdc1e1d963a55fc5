//! Audio output for Mixdeck
//!
//! A single cpal output stream owns the [`AudioEngine`](crate::engine::AudioEngine)
//! and renders the master bus. The control half ([`MixerState`](crate::state::MixerState))
//! talks to it only through lock-free queues and atomics.
//!
//! ```ignore
//! use mixdeck_core::audio::start_audio_system;
//!
//! let system = start_audio_system(&config, Arc::new(MonotonicClock::new()))?;
//! let mut mixer = system.mixer;
//! mixer.load_track(DeckSlot::A, track, pcm)?;
//! mixer.play(DeckSlot::A);
//! // keep `system.handle` alive while audio should run
//! ```

mod config;
mod cpal_backend;
mod error;

pub use config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MIN_BUFFER_SIZE};
pub use cpal_backend::{output_device_names, start_audio_system, AudioHandle, AudioSystem};
pub use error::{AudioError, AudioResult};
