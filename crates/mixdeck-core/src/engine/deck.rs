//! Deck engine - control half of one deck
//!
//! `DeckEngine` owns the transport state machine and the derived playback
//! position. It never touches samples: every change is forwarded to the
//! deck's [`DeckVoice`] through the command queue (transport, buffer swaps)
//! or the atomic parameter slots (rate, volume, EQ).
//!
//! ```text
//!            load                 play
//!   Empty ─────────► Loaded ◄──────────────┐
//!     ▲                │ play     stop     │
//!     │ unload         ▼                   │
//!     └──────────── Playing ◄──── play ── Paused
//!                      │ pause / end        ▲
//!                      └────────────────────┘
//! ```
//!
//! The position while playing is `offset + elapsed · rate` on the injected
//! [`Clock`]; reaching the end of the buffer reads as `Paused` at the
//! duration immediately and is committed by [`DeckEngine::refresh`].

use std::collections::VecDeque;
use std::sync::Arc;

use basedrop::Shared;

use super::clock::{Clock, TransportClock};
use super::command::{command_channel, event_channel, DeckCommand, VoiceEvent};
use super::eq::{EQ_MAX_DB, EQ_MIN_DB};
use super::gc::gc_handle;
use super::params::DeckAtomics;
use super::tap::{TapShared, TapWriter};
use super::voice::DeckVoice;
use crate::audio_file::{DecodedBuffer, PcmData};
use crate::error::{DecodeError, FormatMismatchError, InvalidParameterError};
use crate::types::{DeckSlot, EqBand, Track, TransportState};

/// Pitch fader range in percent (either direction)
pub const PITCH_RANGE_PERCENT: f64 = 8.0;

/// Playback rate for a pitch fader position: `1 + p/100`, p clamped to ±8
pub fn pitch_to_rate(pitch_percent: f64) -> f64 {
    1.0 + pitch_percent.clamp(-PITCH_RANGE_PERCENT, PITCH_RANGE_PERCENT) / 100.0
}

pub struct DeckEngine {
    slot: DeckSlot,
    clock: Arc<dyn Clock>,
    transport: TransportClock,
    state: TransportState,
    track: Option<Track>,
    buffer: Option<Shared<DecodedBuffer>>,
    pitch_percent: f64,
    atomics: Arc<DeckAtomics>,
    tap: Arc<TapShared>,
    commands: rtrb::Producer<DeckCommand>,
    /// Commands that did not fit in the queue, re-sent before the next one
    backlog: VecDeque<DeckCommand>,
    events: rtrb::Consumer<VoiceEvent>,
    /// Rendering fault not yet handed to the mixer state
    fault: Option<FormatMismatchError>,
}

impl DeckEngine {
    /// Create a deck's control half and the voice to hand to the audio thread
    pub fn new(
        slot: DeckSlot,
        clock: Arc<dyn Clock>,
        device_rate: u32,
        volume: f32,
        tap: Arc<TapShared>,
    ) -> (Self, DeckVoice) {
        let (command_tx, command_rx) = command_channel();
        let (event_tx, event_rx) = event_channel();
        let atomics = Arc::new(DeckAtomics::new(volume.clamp(0.0, 1.0)));

        let voice = DeckVoice::new(
            slot,
            device_rate,
            command_rx,
            event_tx,
            Arc::clone(&atomics),
            TapWriter::new(Arc::clone(&tap)),
        );

        let engine = Self {
            slot,
            clock,
            transport: TransportClock::new(),
            state: TransportState::Empty,
            track: None,
            buffer: None,
            pitch_percent: 0.0,
            atomics,
            tap,
            commands: command_tx,
            backlog: VecDeque::new(),
            events: event_rx,
            fault: None,
        };
        (engine, voice)
    }

    pub fn slot(&self) -> DeckSlot {
        self.slot
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    /// Duration of the loaded buffer (0 when empty)
    pub fn duration_seconds(&self) -> f64 {
        self.buffer.as_ref().map_or(0.0, |b| b.duration_seconds())
    }

    pub fn pitch_percent(&self) -> f64 {
        self.pitch_percent
    }

    #[cfg(test)]
    pub(crate) fn playback_rate(&self) -> f64 {
        self.transport.rate()
    }

    /// Effective transport state, including an end of track not yet committed
    pub fn transport_state(&self) -> TransportState {
        if self.state == TransportState::Playing && self.reached_end() {
            TransportState::Paused
        } else {
            self.state
        }
    }

    /// Playback position in seconds, within `[0, duration]`
    pub fn position_seconds(&self) -> f64 {
        if self.buffer.is_none() {
            return 0.0;
        }
        self.raw_position().clamp(0.0, self.duration_seconds())
    }

    /// Position the audio thread actually rendered up to (diagnostics)
    ///
    /// `None` until the voice has rendered a block of the loaded track.
    pub fn rendered_position_seconds(&self) -> Option<f64> {
        let buffer = self.buffer.as_ref()?;
        let (track, frame) = self.atomics.rendered()?;
        (track == buffer.track_id()).then(|| frame as f64 / buffer.sample_rate() as f64)
    }

    fn raw_position(&self) -> f64 {
        self.transport.position(self.clock.now())
    }

    fn reached_end(&self) -> bool {
        self.buffer.is_some() && self.raw_position() >= self.duration_seconds()
    }

    fn frame_at(&self, seconds: f64) -> f64 {
        self.buffer
            .as_ref()
            .map_or(0.0, |b| seconds * b.sample_rate() as f64)
    }

    /// Queue a command for the voice, keeping order with any backlog
    fn send(&mut self, command: DeckCommand) {
        self.flush_backlog();
        if !self.backlog.is_empty() {
            self.backlog.push_back(command);
            return;
        }
        if let Err(rtrb::PushError::Full(command)) = self.commands.push(command) {
            log::warn!("{} command queue full, deferring", self.slot);
            self.backlog.push_back(command);
        }
    }

    fn flush_backlog(&mut self) {
        while let Some(command) = self.backlog.pop_front() {
            if let Err(rtrb::PushError::Full(command)) = self.commands.push(command) {
                self.backlog.push_front(command);
                return;
            }
        }
    }

    /// Decode `pcm` and make it the deck's buffer, stopped at 0
    ///
    /// On error the deck is left exactly as it was.
    pub fn load(&mut self, track: Track, pcm: PcmData) -> Result<(), DecodeError> {
        let decoded = DecodedBuffer::decode(track.id, pcm)?;
        log::info!(
            "{} loaded '{}' ({:.1}s, {}Hz, {}ch)",
            self.slot,
            track.display_name(),
            decoded.duration_seconds(),
            decoded.sample_rate(),
            decoded.channels()
        );

        if let Some(previous) = &self.buffer {
            log::debug!("{} replacing track {}", self.slot, previous.track_id());
        }
        let buffer = Shared::new(&gc_handle(), decoded);
        self.send(DeckCommand::Load {
            buffer: Shared::clone(&buffer),
        });
        self.buffer = Some(buffer);
        self.track = Some(track);
        self.transport.stop_at(0.0);
        self.state = TransportState::Loaded;
        self.fault = None;
        self.tap.set_loaded(true);
        Ok(())
    }

    /// Start playback; no-op when empty or already playing
    ///
    /// Playing from the very end of the track starts over from 0.
    pub fn play(&mut self) {
        self.refresh();
        match self.state {
            TransportState::Loaded | TransportState::Paused => {
                let now = self.clock.now();
                if self.reached_end() {
                    self.transport.set_position(0.0, now);
                }
                let frame = self.frame_at(self.raw_position());
                self.send(DeckCommand::Play { frame });
                self.transport.start(now);
                self.state = TransportState::Playing;
                log::debug!("{} play from {:.3}s", self.slot, self.position_seconds());
            }
            TransportState::Empty | TransportState::Playing => {}
        }
    }

    /// Pause at the current position; no-op unless playing
    pub fn pause(&mut self) {
        self.refresh();
        if self.state == TransportState::Playing {
            let at = self.transport.stop(self.clock.now());
            self.transport.stop_at(at.clamp(0.0, self.duration_seconds()));
            self.send(DeckCommand::Pause);
            self.state = TransportState::Paused;
            log::debug!("{} paused at {:.3}s", self.slot, self.position_seconds());
        }
    }

    /// Stop and return to the start; the track stays loaded
    pub fn stop(&mut self) {
        if !self.state.has_track() {
            return;
        }
        if self.state == TransportState::Playing {
            self.send(DeckCommand::Pause);
        }
        self.transport.stop_at(0.0);
        self.state = TransportState::Loaded;
        log::debug!("{} stopped", self.slot);
    }

    /// Drop the track; no-op when already empty
    pub fn unload(&mut self) {
        if !self.state.has_track() {
            return;
        }
        self.send(DeckCommand::Unload);
        if let Some(track) = self.track.take() {
            log::info!("{} unloaded '{}'", self.slot, track.display_name());
        }
        self.buffer = None;
        self.transport.stop_at(0.0);
        self.state = TransportState::Empty;
        self.fault = None;
        self.tap.set_loaded(false);
    }

    /// Move to `seconds`, clamped to `[0, duration]`; returns the new position
    ///
    /// While playing, the voice jumps at its next block. A deck without a
    /// track stays at 0.
    pub fn seek(&mut self, seconds: f64) -> Result<f64, InvalidParameterError> {
        let seconds = InvalidParameterError::check_finite("position", seconds)?;
        if !self.state.has_track() {
            return Ok(0.0);
        }
        self.refresh();
        let target = seconds.clamp(0.0, self.duration_seconds());
        self.transport.set_position(target, self.clock.now());
        if self.state == TransportState::Playing {
            let frame = self.frame_at(target);
            self.send(DeckCommand::Play { frame });
        }
        log::debug!("{} seek to {:.3}s", self.slot, target);
        Ok(target)
    }

    /// Set the pitch fader; returns the clamped value
    ///
    /// The transport clock is re-anchored so the position stays continuous.
    pub fn set_pitch(&mut self, pitch_percent: f64) -> Result<f64, InvalidParameterError> {
        let pitch = InvalidParameterError::check_finite("pitch", pitch_percent)?
            .clamp(-PITCH_RANGE_PERCENT, PITCH_RANGE_PERCENT);
        self.refresh();
        let rate = pitch_to_rate(pitch);
        self.transport.set_rate(rate, self.clock.now());
        self.atomics.rate.store(rate);
        self.pitch_percent = pitch;
        Ok(pitch)
    }

    /// Set the channel gain; returns the clamped value
    pub fn set_volume(&mut self, volume: f64) -> Result<f64, InvalidParameterError> {
        let volume = InvalidParameterError::check_finite("volume", volume)?.clamp(0.0, 1.0);
        self.atomics.volume.store(volume as f32);
        Ok(volume)
    }

    /// Set one EQ band in dB; returns the clamped value
    pub fn set_eq(&mut self, band: EqBand, gain_db: f64) -> Result<f64, InvalidParameterError> {
        let gain_db = InvalidParameterError::check_finite("eq", gain_db)?
            .clamp(EQ_MIN_DB as f64, EQ_MAX_DB as f64);
        self.atomics.eq(band).store(gain_db as f32);
        Ok(gain_db)
    }

    /// Commit an end-of-track transition and collect voice events
    ///
    /// Returns true when the transport state changed.
    pub fn refresh(&mut self) -> bool {
        self.flush_backlog();
        while let Ok(event) = self.events.pop() {
            match event {
                VoiceEvent::Fault(error) => {
                    log::warn!("{} cannot render its track: {}", self.slot, error);
                    self.fault = Some(error);
                }
            }
        }

        if self.state == TransportState::Playing && self.reached_end() {
            let duration = self.duration_seconds();
            self.transport.stop_at(duration);
            self.send(DeckCommand::Pause);
            self.state = TransportState::Paused;
            log::debug!("{} reached end of track at {:.3}s", self.slot, duration);
            return true;
        }
        false
    }

    /// Take a rendering fault reported since the last call
    pub fn take_fault(&mut self) -> Option<FormatMismatchError> {
        self.fault.take()
    }

    /// Commands waiting for room in the queue
    #[cfg(test)]
    pub(crate) fn backlog_len(&self) -> usize {
        self.backlog.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::clock::ManualClock;
    use crate::types::StereoBuffer;

    /// Mono track sampled at 1kHz (keeps long tracks small)
    fn track(id: u64, seconds: f64) -> (Track, PcmData) {
        let frames = (seconds * 1000.0) as usize;
        let track = Track {
            id,
            title: format!("Track {}", id),
            artist: "Test".into(),
            duration_seconds: seconds,
            bpm: Some(124.0),
            key: None,
            audio_source: format!("/tmp/{}.wav", id),
        };
        (track, PcmData::new(1000, 1, vec![0.1; frames]))
    }

    fn deck() -> (DeckEngine, DeckVoice, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let (engine, voice) = DeckEngine::new(
            DeckSlot::A,
            clock.clone() as Arc<dyn Clock>,
            1000,
            0.8,
            TapShared::new(64),
        );
        (engine, voice, clock)
    }

    fn loaded_deck(seconds: f64) -> (DeckEngine, DeckVoice, Arc<ManualClock>) {
        let (mut engine, voice, clock) = deck();
        let (t, pcm) = track(1, seconds);
        engine.load(t, pcm).unwrap();
        (engine, voice, clock)
    }

    #[test]
    fn test_pitch_to_rate() {
        assert_eq!(pitch_to_rate(0.0), 1.0);
        assert!((pitch_to_rate(8.0) - 1.08).abs() < 1e-12);
        assert!((pitch_to_rate(-8.0) - 0.92).abs() < 1e-12);
        assert!((pitch_to_rate(50.0) - 1.08).abs() < 1e-12);
    }

    #[test]
    fn test_load_resets_to_loaded() {
        let (engine, _voice, _clock) = loaded_deck(180.0);
        assert_eq!(engine.transport_state(), TransportState::Loaded);
        assert_eq!(engine.position_seconds(), 0.0);
        assert!((engine.duration_seconds() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_error_leaves_state_unchanged() {
        let (mut engine, _voice, clock) = loaded_deck(180.0);
        engine.play();
        clock.advance_secs(3.0);

        let (t, _) = track(2, 10.0);
        let err = engine.load(t, PcmData::new(1000, 2, vec![0.0; 3])).unwrap_err();
        assert_eq!(err, DecodeError::RaggedFrames { samples: 3, channels: 2 });
        assert_eq!(engine.transport_state(), TransportState::Playing);
        assert_eq!(engine.track().map(|t| t.id), Some(1));
        assert!((engine.position_seconds() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_play_pause_idempotent() {
        let (mut engine, _voice, clock) = loaded_deck(180.0);
        engine.play();
        clock.advance_secs(2.0);
        engine.play();
        assert_eq!(engine.transport_state(), TransportState::Playing);
        assert!((engine.position_seconds() - 2.0).abs() < 1e-9);

        engine.pause();
        clock.advance_secs(5.0);
        engine.pause();
        assert_eq!(engine.transport_state(), TransportState::Paused);
        assert!((engine.position_seconds() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_deck_ignores_transport() {
        let (mut engine, _voice, _clock) = deck();
        engine.play();
        engine.pause();
        engine.stop();
        engine.unload();
        assert_eq!(engine.transport_state(), TransportState::Empty);
        assert_eq!(engine.seek(30.0), Ok(0.0));
        assert_eq!(engine.position_seconds(), 0.0);
    }

    #[test]
    fn test_seek_clamps_to_track() {
        let (mut engine, _voice, _clock) = loaded_deck(180.0);
        assert_eq!(engine.seek(-5.0), Ok(0.0));
        assert_eq!(engine.position_seconds(), 0.0);
        assert_eq!(engine.seek(500.0), Ok(180.0));
        assert_eq!(engine.position_seconds(), 180.0);
        assert_eq!(engine.transport_state(), TransportState::Loaded);
        assert!(engine.seek(f64::NAN).is_err());
        assert_eq!(engine.position_seconds(), 180.0);
    }

    #[test]
    fn test_pitch_change_keeps_position_continuous() {
        // 200s track, play 10s at rate 1.0, then 10s at +8%
        let (mut engine, _voice, clock) = loaded_deck(200.0);
        engine.play();
        clock.advance_secs(10.0);
        assert!((engine.position_seconds() - 10.0).abs() < 1e-9);

        assert_eq!(engine.set_pitch(8.0), Ok(8.0));
        assert!((engine.position_seconds() - 10.0).abs() < 1e-9);
        clock.advance_secs(10.0);
        assert!((engine.position_seconds() - 20.8).abs() < 1e-9);
        assert!((engine.playback_rate() - 1.08).abs() < 1e-12);
    }

    #[test]
    fn test_auto_pause_at_end() {
        let (mut engine, _voice, clock) = loaded_deck(5.0);
        engine.play();
        clock.advance_secs(6.0);

        // Reads reflect the end before it is committed
        assert_eq!(engine.transport_state(), TransportState::Paused);
        assert_eq!(engine.position_seconds(), 5.0);

        assert!(engine.refresh());
        assert!(!engine.refresh());
        clock.advance_secs(1.0);
        assert_eq!(engine.transport_state(), TransportState::Paused);
        assert_eq!(engine.position_seconds(), 5.0);
    }

    #[test]
    fn test_play_at_end_restarts() {
        let (mut engine, _voice, clock) = loaded_deck(5.0);
        engine.play();
        clock.advance_secs(6.0);
        engine.play();
        assert_eq!(engine.transport_state(), TransportState::Playing);
        clock.advance_secs(1.0);
        assert!((engine.position_seconds() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_stop_returns_to_start() {
        let (mut engine, _voice, clock) = loaded_deck(60.0);
        engine.play();
        clock.advance_secs(12.0);
        engine.stop();
        assert_eq!(engine.transport_state(), TransportState::Loaded);
        assert_eq!(engine.position_seconds(), 0.0);
        assert!(engine.track().is_some());
    }

    #[test]
    fn test_unload_and_reload() {
        let (mut engine, _voice, clock) = loaded_deck(60.0);
        engine.play();
        clock.advance_secs(4.0);
        engine.unload();
        assert_eq!(engine.transport_state(), TransportState::Empty);
        assert!(engine.track().is_none());
        assert_eq!(engine.duration_seconds(), 0.0);

        let (t, pcm) = track(3, 30.0);
        engine.load(t, pcm).unwrap();
        assert_eq!(engine.transport_state(), TransportState::Loaded);
        assert_eq!(engine.position_seconds(), 0.0);
    }

    #[test]
    fn test_controls_clamp_and_reject_nan() {
        let (mut engine, _voice, _clock) = deck();
        assert_eq!(engine.set_volume(1.5), Ok(1.0));
        assert_eq!(engine.set_volume(-0.2), Ok(0.0));
        assert_eq!(engine.set_eq(EqBand::Low, 20.0), Ok(12.0));
        assert_eq!(engine.set_eq(EqBand::High, -30.0), Ok(-12.0));
        assert_eq!(engine.set_pitch(-10.0), Ok(-8.0));
        assert!(engine.set_volume(f64::NAN).is_err());
        assert!(engine.set_pitch(f64::INFINITY).is_err());
        assert_eq!(engine.pitch_percent(), -8.0);
    }

    #[test]
    fn test_voice_follows_engine() {
        let (mut engine, mut voice, _clock) = loaded_deck(1.0);
        let mut out = StereoBuffer::silence(16);

        voice.process(&mut out);
        assert!(out.iter().all(|s| s.left == 0.0));

        engine.play();
        voice.process(&mut out);
        assert!(voice.is_playing());
        assert!(out[15].left > 0.0);

        engine.seek(0.5).unwrap();
        voice.process(&mut out);
        let rendered = engine.rendered_position_seconds().unwrap();
        assert!((rendered - 0.516).abs() < 1e-9);

        engine.pause();
        voice.process(&mut out);
        assert!(!voice.is_playing());
    }

    #[test]
    fn test_rendered_position_follows_loaded_track() {
        let (mut engine, mut voice, _clock) = loaded_deck(1.0);
        let mut out = StereoBuffer::silence(16);
        assert_eq!(engine.rendered_position_seconds(), None);

        engine.play();
        voice.process(&mut out);
        assert!((engine.rendered_position_seconds().unwrap() - 0.016).abs() < 1e-9);

        // Until the voice picks up the new buffer, nothing is reported
        let (t, pcm) = track(2, 2.0);
        engine.load(t, pcm).unwrap();
        assert_eq!(engine.rendered_position_seconds(), None);

        voice.process(&mut out);
        assert_eq!(engine.rendered_position_seconds(), Some(0.0));

        engine.unload();
        voice.process(&mut out);
        assert_eq!(engine.rendered_position_seconds(), None);
    }

    #[test]
    fn test_format_fault_is_reported_once() {
        let (mut engine, mut voice, _clock) = deck();
        let (t, _) = track(9, 1.0);
        engine.load(t, PcmData::new(1000, 4, vec![0.0; 400])).unwrap();
        let mut out = StereoBuffer::silence(8);
        voice.process(&mut out);

        engine.refresh();
        assert_eq!(
            engine.take_fault(),
            Some(FormatMismatchError::ChannelLayout { channels: 4 })
        );
        engine.refresh();
        assert_eq!(engine.take_fault(), None);
    }

    #[test]
    fn test_full_queue_uses_backlog() {
        let (mut engine, mut voice, _clock) = loaded_deck(10.0);
        for _ in 0..100 {
            engine.play();
            engine.pause();
        }
        assert!(engine.backlog_len() > 0);

        let mut out = StereoBuffer::silence(8);
        while engine.backlog_len() > 0 {
            voice.process(&mut out);
            engine.refresh();
        }
        voice.process(&mut out);
        assert!(!voice.is_playing());
        assert_eq!(engine.transport_state(), TransportState::Paused);
    }
}
