//! Lock-free command and event queues between a deck engine and its voice
//!
//! Transport events and buffer swaps cannot be expressed as a single atomic
//! value, so they travel through a single-producer single-consumer `rtrb`
//! ringbuffer per deck. The control path pushes without blocking; the voice
//! drains the queue at the start of each block, so a command never takes
//! effect in the middle of a block.
//!
//! A second queue carries [`VoiceEvent`]s back from the audio thread.
//!
//! ```ignore
//! let (tx, rx) = command_channel();
//! tx.push(DeckCommand::Pause)?;          // control thread, ~50ns
//! while let Ok(cmd) = rx.pop() { .. }    // audio thread, block start
//! ```

use basedrop::Shared;

use crate::audio_file::DecodedBuffer;
use crate::error::FormatMismatchError;

/// Capacity of a deck's command queue
///
/// The control path issues at most a few commands per operator action and
/// the audio thread drains the queue every block (~5ms), so 64 leaves ample
/// headroom. Overflow is kept in the engine's backlog.
pub const COMMAND_QUEUE_CAPACITY: usize = 64;

/// Capacity of a deck's event queue
pub const EVENT_QUEUE_CAPACITY: usize = 16;

/// Commands sent from a `DeckEngine` to its `DeckVoice`
pub enum DeckCommand {
    /// Swap in a new buffer, stopped at frame 0
    ///
    /// The previous buffer is dropped on the audio thread; `Shared` defers
    /// the deallocation to the GC thread.
    Load { buffer: Shared<DecodedBuffer> },
    /// Drop the buffer and go silent
    Unload,
    /// Start (or keep) rendering from a source frame position
    ///
    /// Also sent for a seek while playing, so a voice that already ran off
    /// the end resumes from the new position.
    Play { frame: f64 },
    /// Stop rendering, keep the buffer
    Pause,
}

/// Events reported by a `DeckVoice`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceEvent {
    /// The loaded buffer cannot be rendered; the deck outputs silence
    Fault(FormatMismatchError),
}

/// Create a deck command queue `(control side, audio side)`
pub fn command_channel() -> (rtrb::Producer<DeckCommand>, rtrb::Consumer<DeckCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Create a voice event queue `(audio side, control side)`
pub fn event_channel() -> (rtrb::Producer<VoiceEvent>, rtrb::Consumer<VoiceEvent>) {
    rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY)
}
