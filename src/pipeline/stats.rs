//! Pipeline diagnostics shared between the worker and the control path.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Raw events delivered by the sensor, accepted or not.
    pub events_seen: AtomicU64,
    pub samples_accepted: AtomicU64,
    /// Raw events per second over the last completed meter window.
    pub current_rate: AtomicU32,
    pub buffered: AtomicU64,
    /// Wall clock of the last successful flush, milliseconds.
    pub last_flush_unix_ms: AtomicI64,
    pub last_error: Mutex<Option<String>>,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_error(&self, err: impl Into<String>) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(err.into());
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|guard| guard.clone())
    }
}
