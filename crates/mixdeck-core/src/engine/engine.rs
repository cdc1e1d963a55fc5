//! Rendering root - runs both voices and the mix bus once per block

use std::sync::Arc;

use crate::types::{StereoBuffer, NUM_DECKS};

use super::{BusAtomics, DeckVoice, MixBus};

/// Maximum block size to pre-allocate for real-time safety
///
/// Covers every common device buffer size (64 to 4096 frames). Larger
/// callbacks are split into chunks by the audio backend.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// The audio-thread half of the mixer
///
/// Owned by the output callback. All communication with the control path
/// goes through each voice's command queue and the atomic parameter slots.
pub struct AudioEngine {
    voices: [DeckVoice; NUM_DECKS],
    /// Pre-allocated per-deck render buffers
    deck_buffers: [StereoBuffer; NUM_DECKS],
    bus: MixBus,
    bus_atomics: Arc<BusAtomics>,
}

impl AudioEngine {
    pub fn new(voices: [DeckVoice; NUM_DECKS], bus_atomics: Arc<BusAtomics>) -> Self {
        let bus = MixBus::new(
            bus_atomics.crossfader.load(),
            bus_atomics.master_volume.load(),
        );
        Self {
            voices,
            deck_buffers: std::array::from_fn(|_| StereoBuffer::silence(MAX_BUFFER_SIZE)),
            bus,
            bus_atomics,
        }
    }

    /// Render one block into `master_out` (its length is the block size)
    pub fn process(&mut self, master_out: &mut StereoBuffer) {
        let buffer_len = master_out.len();
        debug_assert!(buffer_len <= MAX_BUFFER_SIZE, "block larger than MAX_BUFFER_SIZE");

        // Capacity stays at MAX_BUFFER_SIZE, only the length changes
        for buf in &mut self.deck_buffers {
            buf.set_len_from_capacity(buffer_len);
        }

        // Stays on the callback thread: a thread-pool hop blocks and allocates
        for (voice, buffer) in self.voices.iter_mut().zip(&mut self.deck_buffers) {
            voice.process(buffer);
        }

        let [deck_a, deck_b] = &self.deck_buffers;
        self.bus.combine(
            deck_a,
            deck_b,
            self.bus_atomics.crossfader.load(),
            self.bus_atomics.master_volume.load(),
            master_out,
        );
    }
}
