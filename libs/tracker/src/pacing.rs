//! Adaptive Tick Pacing
//!
//! Keeps the long-run average spacing of processed items near the requested
//! interval even though per-item processing cost varies. After each
//! processed tick the controller compares the elapsed wall time against the
//! requested interval plus a small tolerance band and nudges the delay the
//! engine sleeps between ticks, clamping at zero.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub(crate) struct PacingController {
    requested: Duration,
    fuzziness: Duration,
    delay: Duration,
    last_tick: Option<Instant>,
}

impl PacingController {
    pub(crate) fn new(requested: Duration, fuzziness: Duration) -> Self {
        Self {
            requested,
            fuzziness,
            delay: requested,
            last_tick: None,
        }
    }

    /// Delay to sleep before the next tick.
    pub(crate) fn current_delay(&self) -> Duration {
        self.delay
    }

    pub(crate) fn requested(&self) -> Duration {
        self.requested
    }

    /// Replace the requested interval; the adjusted delay restarts from it.
    pub(crate) fn set_interval(&mut self, interval: Duration) {
        self.requested = interval;
        self.delay = interval;
    }

    /// Record a processed tick and adjust the delay from the elapsed time
    /// since the previous one. The first tick only establishes a baseline.
    pub(crate) fn record_tick(&mut self) {
        let now = Instant::now();
        if let Some(prev) = self.last_tick.replace(now) {
            self.adjust(now - prev);
        }
    }

    /// Restart the elapsed-time baseline without adjusting the delay. Used
    /// after the queue has been idle: the idle gap is not processing cost
    /// and must not drive the delay toward zero.
    pub(crate) fn rebaseline(&mut self) {
        self.last_tick = Some(Instant::now());
    }

    fn adjust(&mut self, elapsed: Duration) {
        let t = elapsed.as_nanos() as i128;
        let requested = self.requested.as_nanos() as i128;
        let band = requested + self.fuzziness.as_nanos() as i128;
        let mut delay = self.delay.as_nanos() as i128;

        if t > band {
            delay -= t - requested;
        } else if t < band {
            delay += requested - t;
        }

        self.delay = Duration::from_nanos(delay.clamp(0, u64::MAX as i128) as u64);
    }
}
