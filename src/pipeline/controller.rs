//! Pipeline lifecycle and control surface.
//!
//! The controller owns the worker task and exposes the narrow command
//! surface: start (with optional configuration replacement), stop,
//! set-label, and a sync trigger. Commands never share a call stack with
//! event handling; they go through channels and shared state.

use std::sync::{Arc, RwLock};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{info, warn};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::SensorConfig;
use crate::db::models::LightDevice;
use crate::debug_log;
use crate::sensor::LightSensor;
use crate::storage::{SensorStore, SensorTable, SyncConfig};

use super::{
    stats::PipelineStats,
    worker::{SampleObserver, SampleWorker},
    SensorNotification,
};

/// Raw events queue between the sensor and the worker; a flush in progress
/// delays consumption, it must not drop deliveries.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Covers the storage write timeout with some margin before the worker is
/// force-cancelled at shutdown.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(15);

struct ActiveRun {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

pub struct SensorController<S: SensorStore> {
    config: RwLock<SensorConfig>,
    label: Arc<RwLock<String>>,
    store: Arc<S>,
    sensor: Mutex<Box<dyn LightSensor>>,
    run: Mutex<Option<ActiveRun>>,
    stats: Arc<PipelineStats>,
    notify_tx: broadcast::Sender<SensorNotification>,
}

impl<S: SensorStore> SensorController<S> {
    pub fn new(config: SensorConfig, sensor: Box<dyn LightSensor>, store: Arc<S>) -> Result<Self> {
        config.validate()?;
        let (notify_tx, _) = broadcast::channel(16);
        Ok(Self {
            label: Arc::new(RwLock::new(config.label.clone())),
            config: RwLock::new(config),
            store,
            sensor: Mutex::new(sensor),
            run: Mutex::new(None),
            stats: Arc::new(PipelineStats::new()),
            notify_tx,
        })
    }

    /// Start sampling. A device descriptor snapshot is persisted before
    /// the sensor is registered; fails when the sensor is unavailable or
    /// a run is already active.
    pub async fn start(
        &self,
        config: Option<SensorConfig>,
        observer: Option<SampleObserver>,
    ) -> Result<()> {
        let mut run_guard = self.run.lock().await;
        if run_guard.is_some() {
            bail!("light sensor already active");
        }

        if let Some(config) = config {
            config.validate()?;
            *self.label.write().unwrap() = config.label.clone();
            *self.config.write().unwrap() = config;
        }
        let config = self.config.read().unwrap().clone();

        let mut sensor = self.sensor.lock().await;
        let info = sensor.info().context("light sensor unavailable")?;

        let started_ms = Utc::now().timestamp_millis();
        let device = LightDevice {
            id: None,
            device_id: config.device_id.clone(),
            label: self.label.read().unwrap().clone(),
            timestamp: started_ms,
            max_range: info.max_range,
            min_delay: info.min_delay,
            name: info.name,
            power: info.power,
            resolution: info.resolution,
            sensor_type: info.sensor_type,
            vendor: info.vendor,
            version: info.version,
        };
        self.store
            .save_device(device.clone())
            .await
            .context("failed to persist device descriptor")?;
        debug_log!(config.debug, "light sensor info: {device:?}");

        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();
        let worker = SampleWorker::new(
            &config,
            self.label.clone(),
            self.store.clone(),
            self.stats.clone(),
            observer,
            self.notify_tx.clone(),
            started_ms,
        );
        let handle = tokio::spawn(worker.run(event_rx, cancel.clone()));

        if let Err(err) = sensor.start(config.interval_hz, event_tx) {
            cancel.cancel();
            let _ = handle.await;
            return Err(err).context("failed to start light sensor");
        }

        info!(
            "light service active: {} samples per second",
            config.interval_hz
        );
        *run_guard = Some(ActiveRun { handle, cancel });
        Ok(())
    }

    /// Stop sampling: the sensor stops delivering first, the worker drains
    /// its queue, and whatever is still buffered is discarded.
    pub async fn stop(&self) -> Result<()> {
        let Some(run) = self.run.lock().await.take() else {
            return Ok(());
        };

        self.sensor.lock().await.stop();

        let ActiveRun { mut handle, cancel } = run;
        match tokio::time::timeout(WORKER_DRAIN_TIMEOUT, &mut handle).await {
            Ok(join) => join.context("sample worker task failed to join")?,
            Err(_) => {
                warn!("sample worker did not drain in time, cancelling");
                cancel.cancel();
                handle
                    .await
                    .context("sample worker task failed to join after cancel")?;
            }
        }

        info!("light service stopped");
        Ok(())
    }

    /// Update the label stamped on subsequent samples. Safe to call while
    /// the pipeline runs.
    pub fn set_label(&self, label: impl Into<String>) {
        let label = label.into();
        *self.label.write().unwrap() = label.clone();
        self.config.write().unwrap().label = label.clone();
        info!("sensor label set to {label:?}");
    }

    /// Upload pending records: samples are purged after sync, the device
    /// descriptor is retained.
    pub async fn sync(&self) -> Result<()> {
        self.store
            .start_sync(SensorTable::Samples, SyncConfig::default())
            .await?;
        self.store
            .start_sync(
                SensorTable::Devices,
                SyncConfig {
                    remove_after_sync: false,
                },
            )
            .await?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SensorNotification> {
        self.notify_tx.subscribe()
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        self.stats.clone()
    }

    /// Raw events per second observed over the last meter window.
    pub fn current_rate(&self) -> u32 {
        self.stats
            .current_rate
            .load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    use crate::db::models::LightSample;
    use crate::sensor::{RawLightEvent, SensorInfo};

    #[derive(Default)]
    struct MockStore {
        batches: StdMutex<Vec<Vec<LightSample>>>,
        devices: StdMutex<Vec<LightDevice>>,
        sync_calls: StdMutex<Vec<(SensorTable, bool)>>,
    }

    impl SensorStore for MockStore {
        async fn save_samples(&self, samples: Vec<LightSample>) -> Result<usize> {
            let len = samples.len();
            self.batches.lock().unwrap().push(samples);
            Ok(len)
        }

        async fn save_device(&self, device: LightDevice) -> Result<()> {
            self.devices.lock().unwrap().push(device);
            Ok(())
        }

        async fn start_sync(&self, table: SensorTable, cfg: SyncConfig) -> Result<()> {
            self.sync_calls
                .lock()
                .unwrap()
                .push((table, cfg.remove_after_sync));
            Ok(())
        }
    }

    type TxSlot = Arc<StdMutex<Option<mpsc::Sender<RawLightEvent>>>>;

    struct MockSensor {
        tx_slot: TxSlot,
        stopped: Arc<AtomicBool>,
    }

    impl LightSensor for MockSensor {
        fn info(&self) -> Result<SensorInfo> {
            Ok(SensorInfo {
                max_range: 10_000.0,
                min_delay: 10_000.0,
                name: "mock-light".into(),
                power: 0.1,
                resolution: 1.0,
                sensor_type: "light".into(),
                vendor: "mock".into(),
                version: "1".into(),
            })
        }

        fn start(&mut self, _interval_hz: u32, tx: mpsc::Sender<RawLightEvent>) -> Result<()> {
            *self.tx_slot.lock().unwrap() = Some(tx);
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::Relaxed);
            *self.tx_slot.lock().unwrap() = None;
        }
    }

    fn setup(
        config: SensorConfig,
    ) -> (
        SensorController<MockStore>,
        Arc<MockStore>,
        TxSlot,
        Arc<AtomicBool>,
    ) {
        let store = Arc::new(MockStore::default());
        let tx_slot: TxSlot = Arc::new(StdMutex::new(None));
        let stopped = Arc::new(AtomicBool::new(false));
        let sensor = MockSensor {
            tx_slot: tx_slot.clone(),
            stopped: stopped.clone(),
        };
        let controller =
            SensorController::new(config, Box::new(sensor), store.clone()).expect("controller");
        (controller, store, tx_slot, stopped)
    }

    fn config() -> SensorConfig {
        SensorConfig {
            device_id: "test-device".into(),
            interval_hz: 0,
            ..SensorConfig::default()
        }
    }

    async fn send(tx_slot: &TxSlot, value: f32) {
        let tx = tx_slot.lock().unwrap().clone().expect("sensor running");
        tx.send(RawLightEvent {
            value,
            timestamp_ns: 0,
            accuracy: -1,
        })
        .await
        .expect("send event");
    }

    #[tokio::test]
    async fn start_persists_the_descriptor_once_and_rejects_double_start() {
        let (controller, store, _tx_slot, _stopped) = setup(config());

        controller.start(None, None).await.expect("start");
        {
            let devices = store.devices.lock().unwrap();
            assert_eq!(devices.len(), 1);
            assert_eq!(devices[0].name, "mock-light");
            assert_eq!(devices[0].device_id, "test-device");
        }

        let err = controller.start(None, None).await.unwrap_err();
        assert!(err.to_string().contains("already active"));

        controller.stop().await.expect("stop");
        // Stopping does not re-persist the descriptor.
        assert_eq!(store.devices.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stop_discards_unflushed_samples() {
        let (controller, store, tx_slot, stopped) = setup(config());
        controller.start(None, None).await.expect("start");

        for value in [1.0, 2.0, 3.0] {
            send(&tx_slot, value).await;
        }
        // Let the worker consume the queue before stopping.
        tokio::time::sleep(Duration::from_millis(50)).await;

        controller.stop().await.expect("stop");

        assert!(stopped.load(Ordering::Relaxed));
        assert_eq!(
            controller
                .stats()
                .samples_accepted
                .load(Ordering::Relaxed),
            3
        );
        // No final flush: nothing reached the store.
        assert!(store.batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn label_update_reaches_flushed_samples() {
        // Near-zero flush period: every accepted event flushes.
        let mut cfg = config();
        cfg.flush_period_min = 1e-6;
        let (controller, store, tx_slot, _stopped) = setup(cfg);

        controller.start(None, None).await.expect("start");
        controller.set_label("desk");
        send(&tx_slot, 5.0).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.stop().await.expect("stop");

        let batches = store.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].label, "desk");
    }

    #[tokio::test]
    async fn sync_purges_samples_and_retains_devices() {
        let (controller, store, _tx_slot, _stopped) = setup(config());

        controller.sync().await.expect("sync");

        let calls = store.sync_calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(SensorTable::Samples, true), (SensorTable::Devices, false)]
        );
    }

    #[tokio::test]
    async fn restart_after_stop_is_allowed() {
        let (controller, store, tx_slot, _stopped) = setup(config());

        controller.start(None, None).await.expect("first start");
        controller.stop().await.expect("stop");
        controller.start(None, None).await.expect("second start");

        assert!(tx_slot.lock().unwrap().is_some());
        assert_eq!(store.devices.lock().unwrap().len(), 2);
        controller.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn start_can_replace_the_configuration() {
        let (controller, store, tx_slot, _stopped) = setup(config());

        let replacement = SensorConfig {
            device_id: "other-device".into(),
            label: "lab".into(),
            interval_hz: 0,
            flush_period_min: 1e-6,
            ..SensorConfig::default()
        };
        controller
            .start(Some(replacement), None)
            .await
            .expect("start");

        send(&tx_slot, 7.5).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        controller.stop().await.expect("stop");

        assert_eq!(store.devices.lock().unwrap()[0].device_id, "other-device");
        let batches = store.batches.lock().unwrap();
        assert_eq!(batches[0][0].device_id, "other-device");
        assert_eq!(batches[0][0].label, "lab");
    }
}
