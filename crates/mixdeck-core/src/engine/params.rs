//! Lock-free parameter slots shared between control and audio threads
//!
//! Continuous controls (gain, rate, EQ, crossfader, master volume) are single
//! values the control path overwrites and the audio thread reads once per
//! block. They are stored as bit-cast atomics: a write is a single store, a
//! read never waits, and the audio thread always sees either the old or the
//! new value, never a torn one.
//!
//! All operations use `Ordering::Relaxed`: each slot is independent and only
//! visibility is required.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::types::{EqBand, TrackId};

/// `rendered_track` value while the voice holds no buffer
const NO_RENDERED_TRACK: u64 = u64::MAX;

/// `f32` stored in an `AtomicU32`
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// `f64` stored in an `AtomicU64`
#[derive(Debug)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

/// Per-deck parameter slots
///
/// Written by `DeckEngine` (control path), read by `DeckVoice` at the start
/// of every block. `rendered_frame` flows the other way: the voice reports
/// the source frame it last rendered.
#[derive(Debug)]
pub struct DeckAtomics {
    /// Linear output gain (0.0 to 1.0)
    pub volume: AtomicF32,
    /// Playback rate (1.0 = unaltered)
    pub rate: AtomicF64,
    pub eq_low_db: AtomicF32,
    pub eq_mid_db: AtomicF32,
    pub eq_high_db: AtomicF32,
    /// Source frame position reached by the last rendered block
    pub rendered_frame: AtomicU64,
    /// Track whose buffer the last block was rendered from
    rendered_track: AtomicU64,
}

impl DeckAtomics {
    pub fn new(volume: f32) -> Self {
        Self {
            volume: AtomicF32::new(volume),
            rate: AtomicF64::new(1.0),
            eq_low_db: AtomicF32::new(0.0),
            eq_mid_db: AtomicF32::new(0.0),
            eq_high_db: AtomicF32::new(0.0),
            rendered_frame: AtomicU64::new(0),
            rendered_track: AtomicU64::new(NO_RENDERED_TRACK),
        }
    }

    /// Slot for one EQ band
    pub fn eq(&self, band: EqBand) -> &AtomicF32 {
        match band {
            EqBand::Low => &self.eq_low_db,
            EqBand::Mid => &self.eq_mid_db,
            EqBand::High => &self.eq_high_db,
        }
    }

    /// Frame reached by the audio thread (lock-free)
    #[inline]
    pub fn rendered_frame(&self) -> u64 {
        self.rendered_frame.load(Ordering::Relaxed)
    }

    /// Called by the voice once per block
    ///
    /// The track id is stored after the frame with `Release`, so a reader that
    /// sees a track id also sees a frame from that track.
    #[inline]
    pub fn publish_rendered(&self, track: Option<TrackId>, frame: u64) {
        self.rendered_frame.store(frame, Ordering::Relaxed);
        self.rendered_track
            .store(track.unwrap_or(NO_RENDERED_TRACK), Ordering::Release);
    }

    /// Track and frame of the last rendered block, if it had a buffer
    pub fn rendered(&self) -> Option<(TrackId, u64)> {
        match self.rendered_track.load(Ordering::Acquire) {
            NO_RENDERED_TRACK => None,
            track => Some((track, self.rendered_frame())),
        }
    }
}

/// Mix bus parameter slots
#[derive(Debug)]
pub struct BusAtomics {
    /// 0.0 = deck A only, 1.0 = deck B only
    pub crossfader: AtomicF32,
    pub master_volume: AtomicF32,
}

impl BusAtomics {
    pub fn new(crossfader: f32, master_volume: f32) -> Self {
        Self {
            crossfader: AtomicF32::new(crossfader),
            master_volume: AtomicF32::new(master_volume),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_float_roundtrip() {
        let a = AtomicF32::new(0.25);
        assert_eq!(a.load(), 0.25);
        a.store(-12.0);
        assert_eq!(a.load(), -12.0);

        let b = AtomicF64::new(1.08);
        assert_eq!(b.load(), 1.08);
    }

    #[test]
    fn test_eq_slots_are_independent() {
        let atomics = DeckAtomics::new(0.8);
        atomics.eq(EqBand::Low).store(6.0);
        atomics.eq(EqBand::High).store(-3.0);
        assert_eq!(atomics.eq_low_db.load(), 6.0);
        assert_eq!(atomics.eq_mid_db.load(), 0.0);
        assert_eq!(atomics.eq_high_db.load(), -3.0);
    }
}
