//! Time sources and the transport clock
//!
//! A deck's playback position is derived from elapsed real time rather than
//! from the number of frames the audio thread happened to render, so it stays
//! correct under variable scheduling latency. The time source is injectable:
//! production uses [`MonotonicClock`], tests drive a [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source shared by the control path
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by `Instant`
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Simulated clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

/// Derived playback position of one deck
///
/// While running, `position = offset + (now - anchor) * rate`. Every play,
/// seek and rate change re-anchors, so the position is continuous across
/// rate changes.
#[derive(Debug, Clone)]
pub struct TransportClock {
    /// Position in seconds at the anchor instant
    offset: f64,
    /// Instant the clock was last (re)started; `None` while stopped
    anchor: Option<Duration>,
    /// Playback rate (1.0 = unaltered)
    rate: f64,
}

impl TransportClock {
    pub fn new() -> Self {
        Self {
            offset: 0.0,
            anchor: None,
            rate: 1.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn rate(&self) -> f64 {
        self.rate
    }

    /// Position in seconds at `now` (unclamped)
    pub fn position(&self, now: Duration) -> f64 {
        match self.anchor {
            Some(anchor) => self.offset + now.saturating_sub(anchor).as_secs_f64() * self.rate,
            None => self.offset,
        }
    }

    /// Start advancing from the current offset
    pub fn start(&mut self, now: Duration) {
        if self.anchor.is_none() {
            self.anchor = Some(now);
        }
    }

    /// Freeze at the position reached at `now` and return it
    pub fn stop(&mut self, now: Duration) -> f64 {
        self.offset = self.position(now);
        self.anchor = None;
        self.offset
    }

    /// Freeze at an explicit position (end of track, unload)
    pub fn stop_at(&mut self, position: f64) {
        self.offset = position;
        self.anchor = None;
    }

    /// Jump to `position`; a running clock keeps running from there
    pub fn set_position(&mut self, position: f64, now: Duration) {
        self.offset = position;
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
    }

    pub fn set_rate(&mut self, rate: f64, now: Duration) {
        if self.anchor.is_some() {
            self.offset = self.position(now);
            self.anchor = Some(now);
        }
        self.rate = rate;
    }
}

impl Default for TransportClock {
    fn default() -> Self {
        Self::new()
    }
}
