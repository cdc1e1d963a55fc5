//! Rate limit for change notifications from continuous controls
//!
//! Dragging a fader produces a change per UI event; observers only need them
//! at display rate. A throttled change inside the interval is remembered as
//! pending so the final value of a gesture is always delivered.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NotifyThrottle {
    interval: Duration,
    last_sent: Option<Duration>,
    pending: bool,
}

impl NotifyThrottle {
    /// At most `rate_hz` notifications per second; 0 (or invalid) disables
    pub fn new(rate_hz: f64) -> Self {
        let interval = if rate_hz.is_finite() && rate_hz > 0.0 {
            Duration::from_secs_f64(1.0 / rate_hz)
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            last_sent: None,
            pending: false,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    fn elapsed(&self, now: Duration) -> bool {
        match self.last_sent {
            Some(last) => now.saturating_sub(last) >= self.interval,
            None => true,
        }
    }

    /// A throttled change happened; true if it may be sent now
    pub fn admit(&mut self, now: Duration) -> bool {
        if self.elapsed(now) {
            self.mark_sent(now);
            true
        } else {
            self.pending = true;
            false
        }
    }

    /// A notification went out (throttled or not); clears the pending flag
    pub fn mark_sent(&mut self, now: Duration) {
        self.last_sent = Some(now);
        self.pending = false;
    }

    /// A pending change whose interval has passed
    pub fn is_due(&self, now: Duration) -> bool {
        self.pending && self.elapsed(now)
    }
}
