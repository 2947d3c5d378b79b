//! Gate deciding which raw events become recorded samples.

/// Applies two rules, in order: a throttle derived from the configured
/// sampling rate, then a minimum change threshold. State advances only when
/// an event is accepted, so the throttle window is measured from the last
/// accepted sample.
#[derive(Debug)]
pub struct SampleFilter {
    interval_hz: u32,
    threshold: f64,
    last_accepted_ms: i64,
    last_accepted_value: f32,
}

impl SampleFilter {
    pub fn new(interval_hz: u32, threshold: f64) -> Self {
        Self {
            interval_hz,
            threshold,
            last_accepted_ms: 0,
            last_accepted_value: 0.0,
        }
    }

    /// Decide whether the event at `now_ms` carrying `value` lux is
    /// accepted. No side effects beyond the filter's own state.
    pub fn accept(&mut self, now_ms: i64, value: f32) -> bool {
        // 900 rather than 1000 admits events slightly faster than the
        // nominal rate; recorded data depends on this exact multiplier.
        if self.interval_hz > 0
            && ((now_ms - self.last_accepted_ms) as f64) < 900.0 / f64::from(self.interval_hz)
        {
            return false;
        }

        if self.threshold > 0.0
            && f64::from((value - self.last_accepted_value).abs()) < self.threshold
        {
            return false;
        }

        self.last_accepted_ms = now_ms;
        self.last_accepted_value = value;
        true
    }
}
