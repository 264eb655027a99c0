//! Gapless scheduling of inbound audio chunks

use tracing::debug;

/// Schedules chunks back to back on the output clock
///
/// A chunk starts when the previous one ends, or now if the queue has run
/// dry. Times are seconds on the sink's clock.
#[derive(Debug, Clone, Default)]
pub struct PlaybackScheduler {
    next_start: f64,
}

impl PlaybackScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start time for a chunk of `duration` seconds arriving at `now`
    pub fn schedule(&mut self, now: f64, duration: f64) -> f64 {
        let start = self.next_start.max(now);
        self.next_start = start + duration;
        debug!(%now, %duration, %start, next_start = self.next_start, "PlaybackScheduler::schedule: called");
        start
    }

    /// When the queued audio runs out
    pub fn next_start(&self) -> f64 {
        self.next_start
    }

    /// Forget queued audio (model interrupted)
    pub fn reset(&mut self) {
        debug!("PlaybackScheduler::reset: called");
        self.next_start = 0.0;
    }
}
