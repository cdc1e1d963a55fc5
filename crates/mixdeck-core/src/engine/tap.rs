//! Analysis tap for waveform and spectrum displays
//!
//! Each deck's voice copies its post-chain mono signal into a [`TapWriter`].
//! Whenever a full window has been collected it is published into one of two
//! atomic banks; readers ([`WaveformTap`]) copy the most recently published
//! bank. A per-bank sequence counter (odd while writing) lets a reader detect
//! that the writer lapped it and retry, so neither side ever waits on the
//! other.

use std::sync::atomic::{fence, AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};

use crate::types::{DeckSlot, Sample, NUM_DECKS};

/// Default analysis window in samples
pub const DEFAULT_TAP_WINDOW: usize = 1024;
/// Accepted window sizes
pub const MIN_TAP_WINDOW: usize = 32;
pub const MAX_TAP_WINDOW: usize = 32768;

/// Attempts a reader makes before accepting a possibly torn copy
const READ_RETRIES: usize = 4;

/// Published-bank marker before the first window completes
const NONE_PUBLISHED: usize = usize::MAX;

/// Window storage shared by one deck's writer and all readers
#[derive(Debug)]
pub struct TapShared {
    window: usize,
    banks: [Box<[AtomicU32]>; 2],
    sequence: [AtomicU64; 2],
    published: AtomicUsize,
    /// Set by the control path while the deck has a track
    loaded: AtomicBool,
    /// Bumped on every load/unload; the writer drops its partial window
    generation: AtomicU64,
}

impl TapShared {
    pub fn new(window: usize) -> Arc<Self> {
        let window = window.clamp(MIN_TAP_WINDOW, MAX_TAP_WINDOW);
        let bank = || (0..window).map(|_| AtomicU32::new(0)).collect::<Box<[_]>>();
        Arc::new(Self {
            window,
            banks: [bank(), bank()],
            sequence: [AtomicU64::new(0), AtomicU64::new(0)],
            published: AtomicUsize::new(NONE_PUBLISHED),
            loaded: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Mark the deck loaded or empty, forgetting the previous track's window
    pub fn set_loaded(&self, loaded: bool) {
        self.generation.fetch_add(1, Ordering::Release);
        self.published.store(NONE_PUBLISHED, Ordering::Release);
        self.loaded.store(loaded, Ordering::Release);
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    fn publish(&self, values: &[Sample]) {
        let bank = match self.published.load(Ordering::Relaxed) {
            0 => 1,
            _ => 0,
        };
        let seq = &self.sequence[bank];
        seq.fetch_add(1, Ordering::Relaxed);
        fence(Ordering::Release);
        for (slot, value) in self.banks[bank].iter().zip(values) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
        seq.fetch_add(1, Ordering::Release);
        self.published.store(bank, Ordering::Release);
    }

    /// Copy the latest completed window into `out` (zeros if none yet)
    fn read_into(&self, out: &mut [Sample]) {
        for _ in 0..READ_RETRIES {
            let bank = self.published.load(Ordering::Acquire);
            if bank == NONE_PUBLISHED {
                out.fill(0.0);
                return;
            }
            let seq = &self.sequence[bank];
            let before = seq.load(Ordering::Acquire);
            if before % 2 == 1 {
                continue;
            }
            for (value, slot) in out.iter_mut().zip(self.banks[bank].iter()) {
                *value = f32::from_bits(slot.load(Ordering::Relaxed));
            }
            fence(Ordering::Acquire);
            if seq.load(Ordering::Relaxed) == before {
                return;
            }
        }
    }
}

/// Audio-thread side of a deck's tap
///
/// The staging buffer is allocated once; `push` never allocates.
pub struct TapWriter {
    shared: Arc<TapShared>,
    staging: Vec<Sample>,
    filled: usize,
    generation: u64,
}

impl TapWriter {
    pub fn new(shared: Arc<TapShared>) -> Self {
        let staging = vec![0.0; shared.window()];
        let generation = shared.generation.load(Ordering::Acquire);
        Self {
            shared,
            staging,
            filled: 0,
            generation,
        }
    }

    /// Drop the staged samples and any published window
    ///
    /// Called by the voice when it switches buffers, so a block rendered
    /// from the old track after `set_loaded` cannot be shown for the new one.
    pub fn restart(&mut self) {
        self.filled = 0;
        self.shared.published.store(NONE_PUBLISHED, Ordering::Release);
    }

    /// Append one post-chain mono sample, publishing when the window is full
    #[inline]
    pub fn push(&mut self, value: Sample) {
        let generation = self.shared.generation.load(Ordering::Acquire);
        if generation != self.generation {
            self.generation = generation;
            self.filled = 0;
        }
        self.staging[self.filled] = value.clamp(-1.0, 1.0);
        self.filled += 1;
        if self.filled == self.staging.len() {
            self.shared.publish(&self.staging);
            self.filled = 0;
        }
    }
}

/// Read-only view of both decks' analysis windows
///
/// Cheap to clone; every clone reads the same shared windows.
#[derive(Clone)]
pub struct WaveformTap {
    decks: [Arc<TapShared>; NUM_DECKS],
    fft: Arc<dyn RealToComplex<f32>>,
    hann: Arc<[f32]>,
}

impl WaveformTap {
    pub fn new(decks: [Arc<TapShared>; NUM_DECKS]) -> Self {
        let window = decks[0].window();
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window);
        let hann: Arc<[f32]> = (0..window)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / window as f32;
                0.5 * (1.0 - phase.cos())
            })
            .collect();
        Self { decks, fft, hann }
    }

    /// Samples per analysis window
    pub fn window(&self) -> usize {
        self.hann.len()
    }

    /// Most recent completed window of the deck's post-chain signal in [-1, 1]
    ///
    /// All zeros while the deck has no track.
    pub fn sample(&self, slot: DeckSlot) -> Vec<f32> {
        let shared = &self.decks[slot.index()];
        let mut out = vec![0.0; shared.window()];
        if shared.is_loaded() {
            shared.read_into(&mut out);
        }
        out
    }

    /// Magnitude spectrum of the same window, `window / 2` bins in [0, 1]
    ///
    /// Bin `k` covers `k · sample_rate / window` Hz. A full-scale sine reads
    /// close to 1.0 in its bin.
    pub fn spectrum(&self, slot: DeckSlot) -> Vec<f32> {
        let bins = self.window() / 2;
        let mut input = self.sample(slot);
        if input.iter().all(|s| *s == 0.0) {
            return vec![0.0; bins];
        }
        for (s, w) in input.iter_mut().zip(self.hann.iter()) {
            *s *= w;
        }

        let mut output = self.fft.make_output_vec();
        if let Err(e) = self.fft.process(&mut input, &mut output) {
            log::warn!("{} spectrum FFT failed: {:?}", slot, e);
            return vec![0.0; bins];
        }

        // Hann coherent gain is 0.5
        let scale = 2.0 / (self.window() as f32 * 0.5);
        output
            .iter()
            .take(bins)
            .map(|c| (c.norm() * scale).clamp(0.0, 1.0))
            .collect()
    }
}

impl std::fmt::Debug for WaveformTap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveformTap")
            .field("window", &self.window())
            .finish()
    }
}
