//! Audio engine - deck engines, voices, mix bus
//!
//! This module contains the real-time half of the console and the glue to
//! its control half:
//! - DeckEngine: transport state machine and derived position (control path)
//! - DeckVoice: buffer reader, gain and EQ chain, analysis tap (audio thread)
//! - MixBus: equal-power crossfader and master gain
//! - AudioEngine: renders both voices and the bus once per block

mod clock;
mod command;
mod deck;
mod engine;
mod eq;
mod gc;
mod mixer;
mod params;
mod tap;
mod voice;

pub use clock::*;
pub use command::*;
pub use deck::*;
pub use engine::*;
pub use eq::*;
pub use gc::gc_handle;
pub use mixer::*;
pub use params::*;
pub use tap::*;
pub use voice::*;
