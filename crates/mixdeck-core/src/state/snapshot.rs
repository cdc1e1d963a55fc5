//! Records published to observers

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FormatMismatchError;
use crate::types::{CuePoint, DeckSlot, EqBand, Track, TransportState, NUM_DECKS};

/// One deck as seen by observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deck {
    pub track: Option<Track>,
    pub transport_state: TransportState,
    pub position_seconds: f64,
    pub volume: f64,
    pub pitch_percent: f64,
    pub cue_points: Vec<CuePoint>,
}

/// 3-band EQ gains of one deck in dB
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EqSettings {
    pub high: f64,
    pub mid: f64,
    pub low: f64,
}

impl EqSettings {
    pub fn get(&self, band: EqBand) -> f64 {
        match band {
            EqBand::Low => self.low,
            EqBand::Mid => self.mid,
            EqBand::High => self.high,
        }
    }

    pub fn set(&mut self, band: EqBand, gain_db: f64) {
        match band {
            EqBand::Low => self.low = gain_db,
            EqBand::Mid => self.mid = gain_db,
            EqBand::High => self.high = gain_db,
        }
    }
}

/// Complete console state at one instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixerSnapshot {
    pub decks: [Deck; NUM_DECKS],
    pub eq: [EqSettings; NUM_DECKS],
    pub crossfader: f64,
    pub master_volume: f64,
}

impl MixerSnapshot {
    pub fn deck(&self, slot: DeckSlot) -> &Deck {
        &self.decks[slot.index()]
    }

    pub fn eq(&self, slot: DeckSlot) -> &EqSettings {
        &self.eq[slot.index()]
    }
}

/// Notification delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum MixerEvent {
    /// State after a committed action
    Changed(Arc<MixerSnapshot>),
    /// A deck's track cannot be rendered and the deck is silent
    DeckFault {
        slot: DeckSlot,
        error: FormatMismatchError,
    },
}
