//! Per-event orchestration: rate metering, filtering, sample construction,
//! observer notification, buffering, and the periodic flush.

use std::sync::{
    atomic::Ordering,
    Arc, RwLock,
};

use anyhow::Result;
use chrono::Utc;
use log::{error, warn};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::config::SensorConfig;
use crate::db::models::LightSample;
use crate::debug_log;
use crate::sensor::RawLightEvent;
use crate::storage::SensorStore;

use super::{
    buffer::SampleBuffer, filter::SampleFilter, flush::FlushScheduler, rate::RateMeter,
    stats::PipelineStats, SensorNotification,
};

/// Callback invoked synchronously on the worker for every accepted sample.
pub type SampleObserver = Box<dyn Fn(&LightSample) -> Result<()> + Send + Sync>;

pub(crate) struct SampleWorker<S: SensorStore> {
    device_id: String,
    label: Arc<RwLock<String>>,
    debug: bool,
    filter: SampleFilter,
    rate: RateMeter,
    buffer: SampleBuffer,
    flush: FlushScheduler,
    store: Arc<S>,
    stats: Arc<PipelineStats>,
    observer: Option<SampleObserver>,
    notify_tx: broadcast::Sender<SensorNotification>,
}

impl<S: SensorStore> SampleWorker<S> {
    pub(crate) fn new(
        config: &SensorConfig,
        label: Arc<RwLock<String>>,
        store: Arc<S>,
        stats: Arc<PipelineStats>,
        observer: Option<SampleObserver>,
        notify_tx: broadcast::Sender<SensorNotification>,
        started_ms: i64,
    ) -> Self {
        Self {
            device_id: config.device_id.clone(),
            label,
            debug: config.debug,
            filter: SampleFilter::new(config.interval_hz, config.threshold),
            rate: RateMeter::new(started_ms),
            buffer: SampleBuffer::new(),
            flush: FlushScheduler::new(config.flush_period_min, started_ms),
            store,
            stats,
            observer,
            notify_tx,
        }
    }

    /// Serial event loop. Exits when the sensor drops its sender (the
    /// queue drains first) or on cancellation; either way unflushed
    /// samples are discarded, there is no final flush.
    pub(crate) async fn run(
        mut self,
        mut events: mpsc::Receiver<RawLightEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(event) => {
                            self.handle_event(Utc::now().timestamp_millis(), event).await;
                        }
                        None => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        let dropped = self.buffer.len();
        if dropped > 0 {
            warn!("discarding {dropped} unflushed samples at shutdown");
        }
    }

    pub(crate) async fn handle_event(&mut self, now_ms: i64, event: RawLightEvent) {
        self.rate.record(now_ms);
        self.stats
            .current_rate
            .store(self.rate.current(), Ordering::Relaxed);
        self.stats.events_seen.fetch_add(1, Ordering::Relaxed);

        if !self.filter.accept(now_ms, event.value) {
            return;
        }

        let label = self.label.read().unwrap().clone();
        let sample = LightSample {
            id: None,
            device_id: self.device_id.clone(),
            label,
            timestamp: now_ms,
            event_timestamp: event.timestamp_ns,
            light: event.value,
            accuracy: event.accuracy,
        };

        if let Some(observer) = &self.observer {
            // An observer failure must never take the pipeline down.
            if let Err(err) = observer(&sample) {
                warn!("sample observer failed: {err:#}");
            }
        }

        self.buffer.push(sample);
        self.stats.samples_accepted.fetch_add(1, Ordering::Relaxed);
        self.stats
            .buffered
            .store(self.buffer.len() as u64, Ordering::Relaxed);

        if !self.flush.is_due(now_ms) {
            return;
        }
        self.flush.mark_flushed(now_ms);

        let batch = self.buffer.drain();
        self.stats.buffered.store(0, Ordering::Relaxed);
        debug_log!(self.debug, "flushing {} samples to storage", batch.len());

        match self.store.save_samples(batch).await {
            Ok(saved) => {
                self.stats
                    .last_flush_unix_ms
                    .store(now_ms, Ordering::Relaxed);
                let _ = self.notify_tx.send(SensorNotification::DataAvailable);
                debug_log!(self.debug, "saved {saved} samples");
            }
            Err(err) => {
                // The batch is gone; the next period gets a fresh attempt.
                self.stats.record_error(err.to_string());
                error!("failed to save sample batch, dropping it: {err:#}");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
