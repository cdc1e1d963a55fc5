//! Mix bus: equal-power crossfader and master gain
//!
//! ```text
//! Deck A chain ──► gainA ──┐
//!                          ├──► Σ ──► master volume ──► output
//! Deck B chain ──► gainB ──┘
//!
//! gainA = cos(c·π/2)   gainB = sin(c·π/2)   (c = crossfader, 0 = A only)
//! ```
//!
//! Both gains are ramped linearly across each block from the previous block's
//! values, so moving the crossfader or master fader never zippers.

use std::f32::consts::FRAC_PI_2;

use crate::types::{StereoBuffer, StereoSample};

/// Equal-power crossfader law `(gainA, gainB)`
///
/// `gainA² + gainB² = 1` for every position; the endpoints are exact so a
/// fully-closed side contributes nothing.
pub fn crossfader_gains(crossfader: f32) -> (f32, f32) {
    if crossfader <= 0.0 {
        return (1.0, 0.0);
    }
    if crossfader >= 1.0 {
        return (0.0, 1.0);
    }
    let angle = crossfader * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

/// Gain that glides linearly to a new target over one block
#[derive(Debug, Clone, Copy)]
pub struct GainRamp {
    current: f32,
}

/// Per-sample gains of one block
#[derive(Debug, Clone, Copy)]
pub struct RampSegment {
    start: f32,
    step: f32,
}

impl GainRamp {
    pub fn new(initial: f32) -> Self {
        Self { current: initial }
    }

    /// Start a block of `len` samples ending exactly on `target`
    #[inline]
    pub fn begin(&mut self, target: f32, len: usize) -> RampSegment {
        let start = self.current;
        self.current = target;
        let step = if len > 0 { (target - start) / len as f32 } else { 0.0 };
        RampSegment { start, step }
    }
}

impl RampSegment {
    /// Gain for sample `i` of the block (the last sample hits the target)
    #[inline]
    pub fn at(&self, i: usize) -> f32 {
        self.start + self.step * (i + 1) as f32
    }
}

/// Combines the two deck outputs into the master output
#[derive(Debug, Clone)]
pub struct MixBus {
    gain_a: GainRamp,
    gain_b: GainRamp,
}

impl MixBus {
    /// Create a bus already settled at the given fader positions
    pub fn new(crossfader: f32, master_volume: f32) -> Self {
        let (a, b) = crossfader_gains(crossfader);
        Self {
            gain_a: GainRamp::new(a * master_volume),
            gain_b: GainRamp::new(b * master_volume),
        }
    }

    /// `master[i] = masterVolume · (gainA·A[i] + gainB·B[i])`
    ///
    /// The output length is `master_out.len()`; missing input samples count
    /// as silence.
    pub fn combine(
        &mut self,
        deck_a: &StereoBuffer,
        deck_b: &StereoBuffer,
        crossfader: f32,
        master_volume: f32,
        master_out: &mut StereoBuffer,
    ) {
        let len = master_out.len();
        let (a, b) = crossfader_gains(crossfader);
        let ramp_a = self.gain_a.begin(a * master_volume, len);
        let ramp_b = self.gain_b.begin(b * master_volume, len);

        let a_in: &[StereoSample] = deck_a;
        let b_in: &[StereoSample] = deck_b;
        for (i, out) in master_out.iter_mut().enumerate() {
            let sa = a_in.get(i).copied().unwrap_or_default();
            let sb = b_in.get(i).copied().unwrap_or_default();
            *out = sa * ramp_a.at(i) + sb * ramp_b.at(i);
        }
    }
}

impl Default for MixBus {
    fn default() -> Self {
        Self::new(0.5, 1.0)
    }
}
