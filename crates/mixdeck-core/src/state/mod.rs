//! Mixer state - single source of truth for the console
//!
//! `MixerState` owns both deck engines, the per-deck volume/pitch/EQ/cue
//! records, the crossfader and the master volume. It is mutated only
//! through its actions; each committed action pushes the new value to the
//! audio thread (queue or atomic, never blocking) and notifies subscribers
//! with a fresh [`MixerSnapshot`].
//!
//! Continuous controls (volume, pitch, EQ, crossfader, master volume) are
//! applied to the audio path immediately but their notifications go through
//! a [`NotifyThrottle`]; [`MixerState::tick`] and [`MixerState::flush`]
//! deliver what the throttle held back.

mod snapshot;
mod throttle;

use std::sync::Arc;

use crossbeam::channel::{unbounded, Receiver, Sender};

use crate::audio_file::PcmData;
use crate::config::{MixerConfig, MixerDefaults};
use crate::engine::{AudioEngine, BusAtomics, Clock, DeckEngine, TapShared, WaveformTap};
use crate::error::{InvalidParameterError, MixerResult};
use crate::types::{CueId, CuePoint, DeckSlot, EqBand, Track, TransportState, NUM_DECKS};

pub use snapshot::{Deck, EqSettings, MixerEvent, MixerSnapshot};
pub use throttle::NotifyThrottle;

/// Per-deck values the engine doesn't track itself
#[derive(Debug, Clone)]
struct DeckRecord {
    volume: f64,
    cue_points: Vec<CuePoint>,
}

pub struct MixerState {
    clock: Arc<dyn Clock>,
    decks: [DeckEngine; NUM_DECKS],
    records: [DeckRecord; NUM_DECKS],
    eq: [EqSettings; NUM_DECKS],
    crossfader: f64,
    master_volume: f64,
    bus: Arc<BusAtomics>,
    tap: WaveformTap,
    subscribers: Vec<Sender<MixerEvent>>,
    throttle: NotifyThrottle,
    next_cue_id: CueId,
}

/// Finite value in [0, 1], or the fallback
fn unit_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

impl MixerState {
    /// Build the control half and the audio engine for a device rate
    ///
    /// The engine goes to the audio thread; everything else stays here.
    pub fn new(config: &MixerConfig, device_rate: u32, clock: Arc<dyn Clock>) -> (Self, AudioEngine) {
        let defaults = MixerDefaults::default();
        let deck_volume = unit_or(config.mixer.deck_volume, defaults.deck_volume);
        let crossfader = unit_or(config.mixer.crossfader, defaults.crossfader);
        let master_volume = unit_or(config.mixer.master_volume, defaults.master_volume);

        let taps = DeckSlot::ALL.map(|_| TapShared::new(config.tap_window));
        let tap = WaveformTap::new(taps.clone());

        let [(deck_a, voice_a), (deck_b, voice_b)] = DeckSlot::ALL.map(|slot| {
            DeckEngine::new(
                slot,
                Arc::clone(&clock),
                device_rate,
                deck_volume as f32,
                Arc::clone(&taps[slot.index()]),
            )
        });

        let bus = Arc::new(BusAtomics::new(crossfader as f32, master_volume as f32));
        let engine = AudioEngine::new([voice_a, voice_b], Arc::clone(&bus));

        log::info!(
            "Mixer ready at {}Hz (deck volume {:.2}, crossfader {:.2}, master {:.2})",
            device_rate,
            deck_volume,
            crossfader,
            master_volume
        );

        let state = Self {
            clock,
            decks: [deck_a, deck_b],
            records: DeckSlot::ALL.map(|_| DeckRecord {
                volume: deck_volume,
                cue_points: Vec::new(),
            }),
            eq: [EqSettings::default(); NUM_DECKS],
            crossfader,
            master_volume,
            bus,
            tap,
            subscribers: Vec::new(),
            throttle: NotifyThrottle::new(config.notify_rate_hz),
            next_cue_id: 1,
        };
        (state, engine)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────

    /// Receive every future notification; dropping the receiver unsubscribes
    pub fn subscribe(&mut self) -> Receiver<MixerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Read-only access to both decks' analysis windows
    pub fn waveform_tap(&self) -> WaveformTap {
        self.tap.clone()
    }

    /// Current state with positions derived from the transport clocks
    pub fn snapshot(&self) -> MixerSnapshot {
        MixerSnapshot {
            decks: DeckSlot::ALL.map(|slot| self.deck(slot)),
            eq: self.eq,
            crossfader: self.crossfader,
            master_volume: self.master_volume,
        }
    }

    pub fn deck(&self, slot: DeckSlot) -> Deck {
        let engine = &self.decks[slot.index()];
        let record = &self.records[slot.index()];
        Deck {
            track: engine.track().cloned(),
            transport_state: engine.transport_state(),
            position_seconds: engine.position_seconds(),
            volume: record.volume,
            pitch_percent: engine.pitch_percent(),
            cue_points: record.cue_points.clone(),
        }
    }

    pub fn eq(&self, slot: DeckSlot) -> EqSettings {
        self.eq[slot.index()]
    }

    pub fn crossfader(&self) -> f64 {
        self.crossfader
    }

    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    /// Position the audio thread last rendered on a deck (diagnostics)
    pub fn rendered_position_seconds(&self, slot: DeckSlot) -> Option<f64> {
        self.decks[slot.index()].rendered_position_seconds()
    }

    fn emit(&mut self, event: MixerEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Notify now (also clears anything the throttle was holding)
    fn notify(&mut self) {
        self.throttle.mark_sent(self.clock.now());
        let snapshot = Arc::new(self.snapshot());
        self.emit(MixerEvent::Changed(snapshot));
    }

    /// Notify unless the throttle holds it back as pending
    fn notify_throttled(&mut self) {
        if self.throttle.admit(self.clock.now()) {
            let snapshot = Arc::new(self.snapshot());
            self.emit(MixerEvent::Changed(snapshot));
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────

    /// Load a track; on a decode error nothing changes and nobody is notified
    pub fn load_track(&mut self, slot: DeckSlot, track: Track, pcm: PcmData) -> MixerResult<()> {
        if let Err(e) = self.decks[slot.index()].load(track, pcm) {
            log::warn!("{} rejected track: {}", slot, e);
            return Err(e.into());
        }
        self.records[slot.index()].cue_points.clear();
        self.notify();
        Ok(())
    }

    /// Empty the deck; no-op when already empty
    pub fn unload_track(&mut self, slot: DeckSlot) {
        let deck = &mut self.decks[slot.index()];
        if !deck.transport_state().has_track() {
            return;
        }
        deck.unload();
        self.records[slot.index()].cue_points.clear();
        self.notify();
    }

    /// Run a transport operation and notify if the state or position moved
    fn transport(&mut self, slot: DeckSlot, op: impl FnOnce(&mut DeckEngine)) {
        let deck = &mut self.decks[slot.index()];
        let before = (deck.transport_state(), deck.position_seconds());
        op(deck);
        let after = (deck.transport_state(), deck.position_seconds());
        if before != after {
            self.notify();
        }
    }

    pub fn play(&mut self, slot: DeckSlot) {
        self.transport(slot, DeckEngine::play);
    }

    pub fn pause(&mut self, slot: DeckSlot) {
        self.transport(slot, DeckEngine::pause);
    }

    /// Back to the start, keeping the track loaded
    pub fn stop(&mut self, slot: DeckSlot) {
        self.transport(slot, DeckEngine::stop);
    }

    /// Pause when playing, play when loaded or paused, no-op when empty
    pub fn toggle_play(&mut self, slot: DeckSlot) {
        match self.decks[slot.index()].transport_state() {
            TransportState::Playing => self.pause(slot),
            TransportState::Loaded | TransportState::Paused => self.play(slot),
            TransportState::Empty => {}
        }
    }

    /// Seek within the track; returns the clamped position
    ///
    /// An empty deck stays at 0 and nobody is notified.
    pub fn seek(&mut self, slot: DeckSlot, seconds: f64) -> MixerResult<f64> {
        let deck = &mut self.decks[slot.index()];
        let position = deck.seek(seconds)?;
        if deck.transport_state().has_track() {
            self.notify();
        }
        Ok(position)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Continuous controls
    // ─────────────────────────────────────────────────────────────────────

    pub fn set_volume(&mut self, slot: DeckSlot, volume: f64) -> MixerResult<f64> {
        let volume = self.decks[slot.index()].set_volume(volume)?;
        self.records[slot.index()].volume = volume;
        self.notify_throttled();
        Ok(volume)
    }

    pub fn set_pitch(&mut self, slot: DeckSlot, pitch_percent: f64) -> MixerResult<f64> {
        let pitch = self.decks[slot.index()].set_pitch(pitch_percent)?;
        self.notify_throttled();
        Ok(pitch)
    }

    pub fn set_eq(&mut self, slot: DeckSlot, band: EqBand, gain_db: f64) -> MixerResult<f64> {
        let gain_db = self.decks[slot.index()].set_eq(band, gain_db)?;
        self.eq[slot.index()].set(band, gain_db);
        self.notify_throttled();
        Ok(gain_db)
    }

    pub fn set_crossfader(&mut self, value: f64) -> MixerResult<f64> {
        let value = InvalidParameterError::check_finite("crossfader", value)?.clamp(0.0, 1.0);
        self.crossfader = value;
        self.bus.crossfader.store(value as f32);
        self.notify_throttled();
        Ok(value)
    }

    pub fn set_master_volume(&mut self, value: f64) -> MixerResult<f64> {
        let value = InvalidParameterError::check_finite("master volume", value)?.clamp(0.0, 1.0);
        self.master_volume = value;
        self.bus.master_volume.store(value as f32);
        self.notify_throttled();
        Ok(value)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cue points
    // ─────────────────────────────────────────────────────────────────────

    /// Add a cue point at `position_seconds` (clamped to the track)
    ///
    /// Requires a loaded track. Returns the new cue's id.
    pub fn add_cue_point(
        &mut self,
        slot: DeckSlot,
        label: impl Into<String>,
        position_seconds: f64,
    ) -> MixerResult<CueId> {
        let position = InvalidParameterError::check_finite("cue position", position_seconds)?;
        let deck = &self.decks[slot.index()];
        if !deck.transport_state().has_track() {
            return Err(InvalidParameterError::NoTrack(slot).into());
        }
        let position = position.clamp(0.0, deck.duration_seconds());

        let id = self.next_cue_id;
        self.next_cue_id += 1;
        let label = label.into();
        log::debug!("{} cue {} '{}' at {:.3}s", slot, id, label, position);
        self.records[slot.index()].cue_points.push(CuePoint {
            id,
            label,
            position_seconds: position,
        });
        self.notify();
        Ok(id)
    }

    /// Remove a cue point; unknown ids are ignored
    pub fn remove_cue_point(&mut self, slot: DeckSlot, id: CueId) -> Option<CuePoint> {
        let cues = &mut self.records[slot.index()].cue_points;
        let index = cues.iter().position(|c| c.id == id)?;
        let removed = cues.remove(index);
        self.notify();
        Some(removed)
    }

    /// Seek to a cue point's position
    pub fn jump_to_cue(&mut self, slot: DeckSlot, id: CueId) -> MixerResult<f64> {
        let position = self.records[slot.index()]
            .cue_points
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.position_seconds)
            .ok_or(InvalidParameterError::UnknownCue { slot, id })?;
        self.seek(slot, position)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Housekeeping
    // ─────────────────────────────────────────────────────────────────────

    /// Periodic update on the UI cadence
    ///
    /// Commits end-of-track transitions, reports rendering faults once and
    /// delivers a throttled notification whose interval has passed.
    pub fn tick(&mut self) {
        let mut changed = false;
        for slot in DeckSlot::ALL {
            let deck = &mut self.decks[slot.index()];
            changed |= deck.refresh();
            if let Some(error) = deck.take_fault() {
                self.emit(MixerEvent::DeckFault { slot, error });
            }
        }

        if changed || self.throttle.is_due(self.clock.now()) {
            self.notify();
        }
    }

    /// Deliver a held-back notification immediately
    pub fn flush(&mut self) {
        if self.throttle.is_pending() {
            self.notify();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ManualClock;
    use crate::error::{DecodeError, FormatMismatchError, MixerError};
    use crate::types::{StereoBuffer, StereoSample};

    const RATE: u32 = 1000;

    fn track(id: u64, seconds: f64) -> Track {
        Track {
            id,
            title: format!("Track {}", id),
            artist: "Artist".into(),
            duration_seconds: seconds,
            bpm: Some(128.0),
            key: Some("8A".into()),
            audio_source: format!("/music/{}.wav", id),
        }
    }

    fn constant_pcm(seconds: f64, value: f32) -> PcmData {
        PcmData::new(RATE, 1, vec![value; (seconds * RATE as f64) as usize])
    }

    fn mixer_with(config: MixerConfig) -> (MixerState, AudioEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let (state, engine) = MixerState::new(&config, RATE, clock.clone() as Arc<dyn Clock>);
        (state, engine, clock)
    }

    fn mixer() -> (MixerState, AudioEngine, Arc<ManualClock>) {
        mixer_with(MixerConfig::default())
    }

    fn changes(rx: &Receiver<MixerEvent>) -> Vec<Arc<MixerSnapshot>> {
        rx.try_iter()
            .filter_map(|e| match e {
                MixerEvent::Changed(s) => Some(s),
                MixerEvent::DeckFault { .. } => None,
            })
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let (state, _engine, _clock) = mixer();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.crossfader, 0.5);
        assert_eq!(snapshot.master_volume, 0.8);
        for slot in DeckSlot::ALL {
            let deck = snapshot.deck(slot);
            assert_eq!(deck.transport_state, TransportState::Empty);
            assert!(deck.track.is_none());
            assert_eq!(deck.volume, 0.8);
            assert_eq!(deck.pitch_percent, 0.0);
            assert_eq!(*snapshot.eq(slot), EqSettings::default());
        }
    }

    #[test]
    fn test_load_and_toggle_notify() {
        let (mut state, _engine, clock) = mixer();
        let rx = state.subscribe();

        state.load_track(DeckSlot::A, track(1, 180.0), constant_pcm(180.0, 0.1)).unwrap();
        state.toggle_play(DeckSlot::A);
        clock.advance_secs(2.0);
        state.toggle_play(DeckSlot::A);

        let snapshots = changes(&rx);
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].deck(DeckSlot::A).transport_state, TransportState::Loaded);
        assert_eq!(snapshots[1].deck(DeckSlot::A).transport_state, TransportState::Playing);
        let paused = snapshots[2].deck(DeckSlot::A);
        assert_eq!(paused.transport_state, TransportState::Paused);
        assert!((paused.position_seconds - 2.0).abs() < 1e-9);
        assert_eq!(paused.track.as_ref().map(|t| t.id), Some(1));
    }

    #[test]
    fn test_seek_on_empty_deck_is_silent() {
        let (mut state, _engine, _clock) = mixer();
        let rx = state.subscribe();
        assert_eq!(state.seek(DeckSlot::A, 42.0), Ok(0.0));
        assert!(changes(&rx).is_empty());

        state.load_track(DeckSlot::A, track(1, 60.0), constant_pcm(60.0, 0.1)).unwrap();
        assert_eq!(state.seek(DeckSlot::A, 42.0), Ok(42.0));
        assert_eq!(changes(&rx).len(), 2);
    }

    #[test]
    fn test_toggle_on_empty_deck_is_silent() {
        let (mut state, _engine, _clock) = mixer();
        let rx = state.subscribe();
        state.toggle_play(DeckSlot::B);
        state.play(DeckSlot::B);
        state.unload_track(DeckSlot::B);
        assert!(changes(&rx).is_empty());
        assert_eq!(state.deck(DeckSlot::B).transport_state, TransportState::Empty);
    }

    #[test]
    fn test_repeated_play_notifies_once() {
        let (mut state, _engine, _clock) = mixer();
        state.load_track(DeckSlot::A, track(1, 60.0), constant_pcm(60.0, 0.1)).unwrap();
        let rx = state.subscribe();
        state.play(DeckSlot::A);
        state.play(DeckSlot::A);
        state.pause(DeckSlot::A);
        state.pause(DeckSlot::A);
        assert_eq!(changes(&rx).len(), 2);
    }

    #[test]
    fn test_decode_error_is_rejected() {
        let (mut state, _engine, _clock) = mixer();
        state.load_track(DeckSlot::A, track(1, 60.0), constant_pcm(60.0, 0.1)).unwrap();
        let before = state.snapshot();
        let rx = state.subscribe();

        let err = state
            .load_track(DeckSlot::A, track(2, 1.0), PcmData::new(RATE, 1, Vec::new()))
            .unwrap_err();
        assert_eq!(err, MixerError::Decode(DecodeError::Empty));
        assert_eq!(state.snapshot(), before);
        assert!(changes(&rx).is_empty());
    }

    #[test]
    fn test_pitch_scenario_on_200s_track() {
        let (mut state, _engine, clock) = mixer();
        state.load_track(DeckSlot::A, track(1, 200.0), constant_pcm(200.0, 0.1)).unwrap();
        state.play(DeckSlot::A);
        clock.advance_secs(10.0);
        assert!((state.deck(DeckSlot::A).position_seconds - 10.0).abs() < 1e-9);

        state.set_pitch(DeckSlot::A, 8.0).unwrap();
        clock.advance_secs(10.0);
        let deck = state.deck(DeckSlot::A);
        assert!((deck.position_seconds - 20.8).abs() < 1e-9);
        assert_eq!(deck.pitch_percent, 8.0);
    }

    #[test]
    fn test_auto_pause_committed_by_tick() {
        let (mut state, _engine, clock) = mixer();
        state.load_track(DeckSlot::B, track(5, 5.0), constant_pcm(5.0, 0.1)).unwrap();
        state.play(DeckSlot::B);
        let rx = state.subscribe();

        clock.advance_secs(7.5);
        state.tick();
        let snapshots = changes(&rx);
        assert_eq!(snapshots.len(), 1);
        let deck = snapshots[0].deck(DeckSlot::B);
        assert_eq!(deck.transport_state, TransportState::Paused);
        assert_eq!(deck.position_seconds, 5.0);

        // Nothing further to report
        clock.advance_secs(1.0);
        state.tick();
        assert!(changes(&rx).is_empty());
    }

    #[test]
    fn test_seek_clamps() {
        let (mut state, _engine, _clock) = mixer();
        state.load_track(DeckSlot::A, track(1, 180.0), constant_pcm(180.0, 0.1)).unwrap();
        assert_eq!(state.seek(DeckSlot::A, -5.0), Ok(0.0));
        assert_eq!(state.seek(DeckSlot::A, 500.0), Ok(180.0));
        assert_eq!(state.deck(DeckSlot::A).position_seconds, 180.0);
        assert!(matches!(
            state.seek(DeckSlot::A, f64::NAN),
            Err(MixerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_stop_rewinds() {
        let (mut state, _engine, clock) = mixer();
        state.load_track(DeckSlot::A, track(1, 60.0), constant_pcm(60.0, 0.1)).unwrap();
        state.play(DeckSlot::A);
        clock.advance_secs(3.0);
        state.stop(DeckSlot::A);
        let deck = state.deck(DeckSlot::A);
        assert_eq!(deck.transport_state, TransportState::Loaded);
        assert_eq!(deck.position_seconds, 0.0);
    }

    #[test]
    fn test_continuous_controls_clamp() {
        let (mut state, _engine, _clock) = mixer();
        assert_eq!(state.set_volume(DeckSlot::A, 1.7), Ok(1.0));
        assert_eq!(state.set_pitch(DeckSlot::B, -20.0), Ok(-8.0));
        assert_eq!(state.set_eq(DeckSlot::A, EqBand::Mid, 40.0), Ok(12.0));
        assert_eq!(state.set_crossfader(-1.0), Ok(0.0));
        assert_eq!(state.set_master_volume(2.0), Ok(1.0));

        let snapshot = state.snapshot();
        assert_eq!(snapshot.deck(DeckSlot::A).volume, 1.0);
        assert_eq!(snapshot.deck(DeckSlot::B).pitch_percent, -8.0);
        assert_eq!(snapshot.eq(DeckSlot::A).mid, 12.0);
        assert_eq!(snapshot.crossfader, 0.0);
        assert_eq!(snapshot.master_volume, 1.0);
    }

    #[test]
    fn test_non_finite_controls_leave_state_unchanged() {
        let (mut state, _engine, _clock) = mixer();
        let before = state.snapshot();
        assert!(state.set_volume(DeckSlot::A, f64::NAN).is_err());
        assert!(state.set_eq(DeckSlot::A, EqBand::Low, f64::NEG_INFINITY).is_err());
        assert!(state.set_crossfader(f64::NAN).is_err());
        assert!(state.set_master_volume(f64::INFINITY).is_err());
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_throttle_delivers_final_value() {
        let mut config = MixerConfig::default();
        config.notify_rate_hz = 10.0; // 100ms
        let (mut state, _engine, clock) = mixer_with(config);
        let rx = state.subscribe();

        state.set_crossfader(0.1).unwrap();
        clock.advance_secs(0.01);
        state.set_crossfader(0.2).unwrap();
        clock.advance_secs(0.01);
        state.set_crossfader(0.3).unwrap();

        let snapshots = changes(&rx);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].crossfader, 0.1);

        // Still inside the interval
        state.tick();
        assert!(changes(&rx).is_empty());

        clock.advance_secs(0.1);
        state.tick();
        let snapshots = changes(&rx);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].crossfader, 0.3);
    }

    #[test]
    fn test_flush_and_unthrottled_action_deliver_pending() {
        let mut config = MixerConfig::default();
        config.notify_rate_hz = 10.0;
        let (mut state, _engine, _clock) = mixer_with(config);
        let rx = state.subscribe();

        state.set_volume(DeckSlot::A, 0.5).unwrap();
        state.set_volume(DeckSlot::A, 0.4).unwrap();
        state.flush();
        let snapshots = changes(&rx);
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].deck(DeckSlot::A).volume, 0.4);

        // Nothing pending any more
        state.flush();
        assert!(changes(&rx).is_empty());

        state.set_master_volume(0.6).unwrap();
        state.load_track(DeckSlot::B, track(2, 10.0), constant_pcm(10.0, 0.1)).unwrap();
        let snapshots = changes(&rx);
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].master_volume, 0.6);
    }

    #[test]
    fn test_cue_points() {
        let (mut state, _engine, _clock) = mixer();
        assert!(matches!(
            state.add_cue_point(DeckSlot::A, "drop", 30.0),
            Err(MixerError::InvalidParameter(InvalidParameterError::NoTrack(DeckSlot::A)))
        ));

        state.load_track(DeckSlot::A, track(1, 120.0), constant_pcm(120.0, 0.1)).unwrap();
        let intro = state.add_cue_point(DeckSlot::A, "intro", -3.0).unwrap();
        let drop = state.add_cue_point(DeckSlot::A, "drop", 64.0).unwrap();
        let outro = state.add_cue_point(DeckSlot::A, "outro", 900.0).unwrap();
        assert_ne!(intro, drop);

        let cues = state.deck(DeckSlot::A).cue_points;
        assert_eq!(cues.len(), 3);
        assert_eq!(cues[0].position_seconds, 0.0);
        assert_eq!(cues[2].position_seconds, 120.0);

        assert_eq!(state.jump_to_cue(DeckSlot::A, drop), Ok(64.0));
        assert_eq!(state.deck(DeckSlot::A).position_seconds, 64.0);

        let removed = state.remove_cue_point(DeckSlot::A, outro).unwrap();
        assert_eq!(removed.label, "outro");
        assert!(state.remove_cue_point(DeckSlot::A, outro).is_none());
        assert!(matches!(
            state.jump_to_cue(DeckSlot::A, outro),
            Err(MixerError::InvalidParameter(InvalidParameterError::UnknownCue { .. }))
        ));

        // A new track starts without cues
        state.load_track(DeckSlot::A, track(2, 60.0), constant_pcm(60.0, 0.1)).unwrap();
        assert!(state.deck(DeckSlot::A).cue_points.is_empty());
    }

    #[test]
    fn test_crossfader_zero_isolates_deck_b() {
        let mut config = MixerConfig::default();
        config.mixer.deck_volume = 1.0;
        config.mixer.master_volume = 1.0;
        let (mut state, mut engine, _clock) = mixer_with(config);

        state.load_track(DeckSlot::A, track(1, 10.0), constant_pcm(10.0, 0.25)).unwrap();
        state.load_track(DeckSlot::B, track(2, 10.0), constant_pcm(10.0, 0.75)).unwrap();
        state.play(DeckSlot::A);
        state.play(DeckSlot::B);
        state.set_crossfader(0.0).unwrap();

        let mut out = StereoBuffer::silence(64);
        engine.process(&mut out); // ramp from 0.5 to 0.0
        engine.process(&mut out);
        assert!(out.iter().all(|s| *s == StereoSample::mono(0.25)));

        state.set_crossfader(1.0).unwrap();
        engine.process(&mut out);
        engine.process(&mut out);
        assert!(out.iter().all(|s| *s == StereoSample::mono(0.75)));
    }

    #[test]
    fn test_format_fault_reported_once() {
        let (mut state, mut engine, _clock) = mixer();
        let rx = state.subscribe();
        state
            .load_track(DeckSlot::A, track(1, 1.0), PcmData::new(100, 1, vec![0.1; 100]))
            .unwrap();

        let mut out = StereoBuffer::silence(32);
        engine.process(&mut out);
        state.tick();
        engine.process(&mut out);
        state.tick();

        let faults: Vec<_> = rx
            .try_iter()
            .filter_map(|e| match e {
                MixerEvent::DeckFault { slot, error } => Some((slot, error)),
                MixerEvent::Changed(_) => None,
            })
            .collect();
        assert_eq!(
            faults,
            vec![(
                DeckSlot::A,
                FormatMismatchError::SampleRate { source_rate: 100, device_rate: RATE }
            )]
        );
    }

    #[test]
    fn test_waveform_tap_follows_tracks() {
        let mut config = MixerConfig::default();
        config.tap_window = 64;
        config.mixer.deck_volume = 1.0;
        let (mut state, mut engine, _clock) = mixer_with(config);
        let tap = state.waveform_tap();
        assert_eq!(tap.sample(DeckSlot::A), vec![0.0; 64]);

        state.load_track(DeckSlot::A, track(1, 10.0), constant_pcm(10.0, 0.5)).unwrap();
        state.play(DeckSlot::A);
        let mut out = StereoBuffer::silence(64);
        engine.process(&mut out);
        assert!(tap.sample(DeckSlot::A).iter().all(|s| *s == 0.5));
        assert_eq!(tap.sample(DeckSlot::B), vec![0.0; 64]);

        state.unload_track(DeckSlot::A);
        assert_eq!(tap.sample(DeckSlot::A), vec![0.0; 64]);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let (mut state, _engine, _clock) = mixer();
        let rx = state.subscribe();
        drop(state.subscribe());
        state.set_master_volume(0.5).unwrap();
        assert_eq!(state.subscribers.len(), 1);
        assert_eq!(changes(&rx).len(), 1);
    }
}
