//! Rendering half of a deck
//!
//! A `DeckVoice` lives on the audio thread. Once per block it:
//!
//! 1. drains its command queue (load, unload, play, pause)
//! 2. reads the atomic parameter slots (rate, volume, EQ)
//! 3. reads source frames at `rate · source_rate / device_rate` frames per
//!    output sample, linearly interpolated
//! 4. runs the gain → EQ chain and feeds the analysis tap
//!
//! Nothing here allocates or blocks. A buffer swapped out by `Load`/`Unload`
//! is a `basedrop::Shared`, so dropping it only enqueues it for the GC thread.

use std::sync::Arc;

use basedrop::Shared;

use super::command::{DeckCommand, VoiceEvent};
use super::eq::DeckChain;
use super::params::DeckAtomics;
use super::tap::TapWriter;
use crate::audio_file::DecodedBuffer;
use crate::types::{DeckSlot, EqBand, StereoBuffer};

pub struct DeckVoice {
    slot: DeckSlot,
    device_rate: u32,
    commands: rtrb::Consumer<DeckCommand>,
    events: rtrb::Producer<VoiceEvent>,
    atomics: Arc<DeckAtomics>,
    buffer: Option<Shared<DecodedBuffer>>,
    /// Loaded buffer cannot be rendered at the device rate
    faulted: bool,
    playing: bool,
    /// Read head in source frames
    read_pos: f64,
    chain: DeckChain,
    tap: TapWriter,
}

impl DeckVoice {
    pub(crate) fn new(
        slot: DeckSlot,
        device_rate: u32,
        commands: rtrb::Consumer<DeckCommand>,
        events: rtrb::Producer<VoiceEvent>,
        atomics: Arc<DeckAtomics>,
        tap: TapWriter,
    ) -> Self {
        let volume = atomics.volume.load();
        Self {
            slot,
            device_rate,
            commands,
            events,
            atomics,
            buffer: None,
            faulted: false,
            playing: false,
            read_pos: 0.0,
            chain: DeckChain::new(device_rate, volume),
            tap,
        }
    }

    pub fn slot(&self) -> DeckSlot {
        self.slot
    }

    #[cfg(test)]
    pub(crate) fn is_playing(&self) -> bool {
        self.playing
    }

    /// Apply queued commands; called at the start of every block
    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                DeckCommand::Load { buffer } => {
                    self.playing = false;
                    self.read_pos = 0.0;
                    self.faulted = match buffer.check_format(self.device_rate) {
                        Ok(()) => false,
                        Err(e) => {
                            // Full queue means a fault is already pending
                            let _ = self.events.push(VoiceEvent::Fault(e));
                            true
                        }
                    };
                    self.buffer = Some(buffer);
                    self.chain.reset();
                    self.tap.restart();
                }
                DeckCommand::Unload => {
                    self.buffer = None;
                    self.playing = false;
                    self.faulted = false;
                    self.read_pos = 0.0;
                    self.chain.reset();
                    self.tap.restart();
                }
                DeckCommand::Play { frame } => {
                    if self.buffer.is_some() {
                        self.read_pos = frame.max(0.0);
                        self.playing = true;
                    }
                }
                DeckCommand::Pause => {
                    self.playing = false;
                }
            }
        }
    }

    /// Render one block into `out` (its length is the block size)
    pub fn process(&mut self, out: &mut StereoBuffer) {
        self.drain_commands();

        for band in EqBand::ALL {
            self.chain.set_eq_db(band, self.atomics.eq(band).load());
        }

        out.fill_silence();
        if self.playing && !self.faulted {
            if let Some(buffer) = &self.buffer {
                let step = self.atomics.rate.load() * buffer.sample_rate() as f64
                    / self.device_rate as f64;
                let end = buffer.frames() as f64;
                for sample in out.iter_mut() {
                    if self.read_pos >= end {
                        self.playing = false;
                        break;
                    }
                    *sample = buffer.frame_at(self.read_pos);
                    self.read_pos += step;
                }
            }
        }

        let volume = self.atomics.volume.load();
        self.chain.process(out, volume);

        for sample in out.iter() {
            self.tap.push(sample.mid());
        }

        self.atomics.publish_rendered(
            self.buffer.as_ref().map(|b| b.track_id()),
            self.read_pos as u64,
        );
    }
}
