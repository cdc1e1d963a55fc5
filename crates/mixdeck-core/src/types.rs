//! Common types for Mixdeck
//!
//! Sample/buffer types shared by the rendering path, plus the small value
//! types (deck slots, EQ bands, tracks, cue points) that flow between the
//! mixer state and its collaborators.

use serde::{Deserialize, Serialize};

/// Default device sample rate (48kHz)
pub const SAMPLE_RATE: u32 = 48000;

/// Number of decks on the console
pub const NUM_DECKS: usize = 2;

/// Audio sample type
pub type Sample = f32;

/// Deck slot on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum DeckSlot {
    A = 0,
    B = 1,
}

impl DeckSlot {
    /// Both slots in order
    pub const ALL: [DeckSlot; NUM_DECKS] = [DeckSlot::A, DeckSlot::B];

    /// Array index for per-deck storage
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(DeckSlot::A),
            1 => Some(DeckSlot::B),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeckSlot::A => "A",
            DeckSlot::B => "B",
        }
    }
}

impl std::fmt::Display for DeckSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Deck {}", self.name())
    }
}

/// EQ band of a deck's 3-band equalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EqBand {
    Low,
    Mid,
    High,
}

impl EqBand {
    pub const ALL: [EqBand; 3] = [EqBand::Low, EqBand::Mid, EqBand::High];
}

/// Transport state of a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransportState {
    #[default]
    Empty,
    Loaded,
    Playing,
    Paused,
}

impl TransportState {
    /// True when a track is present (every state except `Empty`)
    pub fn has_track(self) -> bool {
        self != TransportState::Empty
    }
}

/// Library identifier of a track
pub type TrackId = u64;

/// Track metadata supplied by the library collaborator
///
/// Never mutated by the engine. `duration_seconds` is informational: the
/// transport uses the duration of the decoded buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Location of the audio file (path or URL), opaque to the engine
    pub audio_source: String,
}

impl Track {
    /// Display label "Artist - Title"
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// Identifier of a cue point, unique within one mixer state
pub type CueId = u64;

/// Operator-set marker on a deck
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuePoint {
    pub id: CueId,
    pub label: String,
    pub position_seconds: f64,
}

/// One stereo frame, laid out `[left, right]`
///
/// `#[repr(C)]` plus `Pod` let a slice of frames go to the device as
/// interleaved `f32` without a copy.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    pub const SILENCE: Self = Self::mono(0.0);

    #[inline]
    pub const fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    #[inline]
    pub const fn mono(value: Sample) -> Self {
        Self::new(value, value)
    }

    #[inline]
    pub fn silence() -> Self {
        Self::SILENCE
    }

    /// Mono fold-down fed to the analysis tap
    #[inline]
    pub fn mid(self) -> Sample {
        0.5 * (self.left + self.right)
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, gain: Sample) -> Self {
        Self::new(self.left * gain, self.right * gain)
    }
}

/// Block of frames rendered per callback
///
/// Allocated once at full capacity. Inside the callback only the working
/// length moves, which never reallocates. Dereferences to a frame slice.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer(Vec<StereoSample>);

impl StereoBuffer {
    pub fn silence(frames: usize) -> Self {
        Self(vec![StereoSample::SILENCE; frames])
    }

    /// Change the working length without reallocating
    ///
    /// `frames` must be within the allocated capacity; newly exposed frames
    /// are silent.
    #[inline]
    pub fn set_len_from_capacity(&mut self, frames: usize) {
        debug_assert!(frames <= self.0.capacity(), "render block exceeds buffer capacity");
        self.0.resize(frames, StereoSample::SILENCE);
    }

    pub fn fill_silence(&mut self) {
        self.0.fill(StereoSample::SILENCE);
    }

    /// `[L, R, L, R, ..]` view for the output device
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.0)
    }
}

impl From<Vec<StereoSample>> for StereoBuffer {
    fn from(frames: Vec<StereoSample>) -> Self {
        Self(frames)
    }
}

impl std::ops::Deref for StereoBuffer {
    type Target = [StereoSample];

    #[inline]
    fn deref(&self) -> &[StereoSample] {
        &self.0
    }
}

impl std::ops::DerefMut for StereoBuffer {
    #[inline]
    fn deref_mut(&mut self) -> &mut [StereoSample] {
        &mut self.0
    }
}
