//! Mixdeck Core - two-deck playback engine, mix bus and mixer state

pub mod audio;
pub mod audio_file;
pub mod config;
pub mod engine;
pub mod error;
pub mod state;
pub mod types;

pub use error::{MixerError, MixerResult};
pub use state::{MixerEvent, MixerSnapshot, MixerState};
pub use types::*;
