//! Per-deck signal chain: gain stage followed by a 3-band equalizer
//!
//! The chain topology is fixed: gain → low shelf → mid peak → high shelf.
//! Each band is an independent biquad stage (RBJ cookbook coefficients).
//! The analysis tap reads the chain's output, so it sees the deck exactly as
//! it enters the mix bus.

use super::mixer::GainRamp;
use crate::types::{EqBand, StereoBuffer, StereoSample};

/// Low shelf corner frequency
pub const EQ_LOW_FREQ: f32 = 320.0;
/// Mid peak center frequency
pub const EQ_MID_FREQ: f32 = 1000.0;
/// High shelf corner frequency
pub const EQ_HIGH_FREQ: f32 = 3200.0;
/// Q for the mid band
pub const EQ_MID_Q: f32 = 0.7;
/// Shelf slope for the low/high bands
const SHELF_SLOPE: f32 = 0.9;

/// EQ gain range in dB
pub const EQ_MIN_DB: f32 = -12.0;
pub const EQ_MAX_DB: f32 = 12.0;

/// Below this magnitude a band is treated as flat and bypassed
const FLAT_THRESHOLD_DB: f32 = 0.1;

/// Biquad filter state (direct form I, stereo)
#[derive(Debug, Clone, Default)]
struct BiquadState {
    x1: StereoSample,
    x2: StereoSample,
    y1: StereoSample,
    y2: StereoSample,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input: StereoSample, c: &BiquadCoeffs) -> StereoSample {
        let left = c.b0 * input.left + c.b1 * self.x1.left + c.b2 * self.x2.left
            - c.a1 * self.y1.left
            - c.a2 * self.y2.left;
        let right = c.b0 * input.right + c.b1 * self.x1.right + c.b2 * self.x2.right
            - c.a1 * self.y1.right
            - c.a2 * self.y2.right;
        let out = StereoSample::new(left, right);

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = out;
        out
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }

    fn shelf_alpha(a: f32, sin_w0: f32) -> f32 {
        sin_w0 / 2.0 * ((a + 1.0 / a) * (1.0 / SHELF_SLOPE - 1.0) + 2.0).sqrt()
    }

    fn low_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * Self::shelf_alpha(a, sin_w0);

        let a0 = (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha) / a0,
            b1: 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0) / a0,
            b2: a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
            a1: -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }

    fn peaking(freq: f32, gain_db: f32, q: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: -2.0 * cos_w0 / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    fn high_shelf(freq: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let two_sqrt_a_alpha = 2.0 * a.sqrt() * Self::shelf_alpha(a, sin_w0);

        let a0 = (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha;
        Self {
            b0: a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha) / a0,
            b1: -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0) / a0,
            b2: a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
            a1: 2.0 * ((a - 1.0) - (a + 1.0) * cos_w0) / a0,
            a2: ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha) / a0,
        }
    }
}

/// One EQ band with cached coefficients
#[derive(Debug, Clone)]
struct EqStage {
    band: EqBand,
    gain_db: f32,
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl EqStage {
    fn new(band: EqBand) -> Self {
        Self {
            band,
            gain_db: 0.0,
            coeffs: BiquadCoeffs::passthrough(),
            state: BiquadState::default(),
        }
    }

    /// Recalculate coefficients when the gain changed (no allocation)
    fn set_gain_db(&mut self, gain_db: f32, sample_rate: f32) {
        let gain_db = gain_db.clamp(EQ_MIN_DB, EQ_MAX_DB);
        if gain_db == self.gain_db {
            return;
        }
        self.gain_db = gain_db;
        self.coeffs = if gain_db.abs() < FLAT_THRESHOLD_DB {
            BiquadCoeffs::passthrough()
        } else {
            match self.band {
                EqBand::Low => BiquadCoeffs::low_shelf(EQ_LOW_FREQ, gain_db, sample_rate),
                EqBand::Mid => BiquadCoeffs::peaking(EQ_MID_FREQ, gain_db, EQ_MID_Q, sample_rate),
                EqBand::High => BiquadCoeffs::high_shelf(EQ_HIGH_FREQ, gain_db, sample_rate),
            }
        };
    }
}

/// Gain and EQ stages of one deck
#[derive(Debug, Clone)]
pub struct DeckChain {
    sample_rate: f32,
    gain: GainRamp,
    stages: [EqStage; 3],
}

impl DeckChain {
    pub fn new(sample_rate: u32, gain: f32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            gain: GainRamp::new(gain),
            stages: EqBand::ALL.map(EqStage::new),
        }
    }

    pub fn set_eq_db(&mut self, band: EqBand, gain_db: f32) {
        let sample_rate = self.sample_rate;
        self.stages[band as usize].set_gain_db(gain_db, sample_rate);
    }

    #[cfg(test)]
    pub(crate) fn eq_db(&self, band: EqBand) -> f32 {
        self.stages[band as usize].gain_db
    }

    /// Apply gain (ramped towards `target_gain` across the block) then EQ
    pub fn process(&mut self, buffer: &mut StereoBuffer, target_gain: f32) {
        let len = buffer.len();
        let ramp = self.gain.begin(target_gain, len);

        for (i, sample) in buffer.iter_mut().enumerate() {
            let mut s = *sample * ramp.at(i);
            for stage in &mut self.stages {
                s = stage.state.process(s, &stage.coeffs);
            }
            *sample = s;
        }
    }

    /// Clear filter memory (on load/unload so the old track doesn't ring on)
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.state.reset();
        }
    }
}
