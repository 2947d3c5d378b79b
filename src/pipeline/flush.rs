//! Time-based flush decision.

/// Due when a full flush period has elapsed since the last flush attempt.
/// The baseline starts at pipeline start and advances on every attempt,
/// successful or not: one attempt per due period, no retry within it.
#[derive(Debug)]
pub struct FlushScheduler {
    period_ms: i64,
    last_flush_ms: i64,
}

impl FlushScheduler {
    pub fn new(flush_period_min: f64, started_ms: i64) -> Self {
        Self {
            period_ms: (flush_period_min * 60_000.0) as i64,
            last_flush_ms: started_ms,
        }
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        now_ms - self.last_flush_ms >= self.period_ms
    }

    pub fn mark_flushed(&mut self, now_ms: i64) {
        self.last_flush_ms = now_ms;
    }
}
