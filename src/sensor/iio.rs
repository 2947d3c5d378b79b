//! Linux IIO light sensor.
//!
//! Polls the illuminance channel of an IIO device directory (e.g.
//! `/sys/bus/iio/devices/iio:device0`). Prefers the processed
//! `in_illuminance_input` channel and falls back to `in_illuminance_raw`
//! scaled by `in_illuminance_scale`.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use log::warn;
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{LightSensor, RawLightEvent, SensorInfo, ACCURACY_UNKNOWN};

/// Poll period when the configured rate is 0 ("fastest").
const FASTEST_POLL_MS: u64 = 10;

pub struct IioLightSensor {
    device_dir: PathBuf,
    cancel: Option<CancellationToken>,
}

impl IioLightSensor {
    /// Fails when the directory has no illuminance channel, the "this
    /// device doesn't have a light sensor" case.
    pub fn new(device_dir: PathBuf) -> Result<Self> {
        if !device_dir.join("in_illuminance_input").exists()
            && !device_dir.join("in_illuminance_raw").exists()
        {
            bail!("no illuminance channel under {}", device_dir.display());
        }
        Ok(Self {
            device_dir,
            cancel: None,
        })
    }
}

impl Drop for IioLightSensor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_trimmed(path: &Path) -> Result<String> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(raw.trim().to_string())
}

fn read_f32(path: &Path) -> Result<f32> {
    read_trimmed(path)?
        .parse::<f32>()
        .with_context(|| format!("invalid float in {}", path.display()))
}

fn read_illuminance(device_dir: &Path) -> Result<f32> {
    let input = device_dir.join("in_illuminance_input");
    if input.exists() {
        return read_f32(&input);
    }
    let raw = read_f32(&device_dir.join("in_illuminance_raw"))?;
    let scale = read_f32(&device_dir.join("in_illuminance_scale")).unwrap_or(1.0);
    Ok(raw * scale)
}

impl LightSensor for IioLightSensor {
    fn info(&self) -> Result<SensorInfo> {
        // Probe the channel once so an unreadable sensor fails the startup
        // path instead of the first poll.
        read_illuminance(&self.device_dir)?;

        let name =
            read_trimmed(&self.device_dir.join("name")).unwrap_or_else(|_| "iio-light".into());
        let resolution = read_f32(&self.device_dir.join("in_illuminance_scale")).unwrap_or(0.0);

        Ok(SensorInfo {
            // sysfs exposes no range or power metadata.
            max_range: 0.0,
            min_delay: (FASTEST_POLL_MS * 1000) as f32,
            name,
            power: 0.0,
            resolution,
            sensor_type: "light".into(),
            vendor: "iio".into(),
            version: "1".into(),
        })
    }

    fn start(&mut self, interval_hz: u32, tx: mpsc::Sender<RawLightEvent>) -> Result<()> {
        if self.cancel.is_some() {
            bail!("iio poller already running");
        }

        let period_ms = if interval_hz > 0 {
            (1000 / u64::from(interval_hz)).max(1)
        } else {
            FASTEST_POLL_MS
        };

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let device_dir = self.device_dir.clone();

        tokio::spawn(async move {
            let epoch = Instant::now();
            let mut ticker = tokio::time::interval(Duration::from_millis(period_ms));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let value = match read_illuminance(&device_dir) {
                            Ok(value) => value,
                            Err(err) => {
                                warn!("light poll failed: {err:#}");
                                continue;
                            }
                        };
                        let event = RawLightEvent {
                            value,
                            timestamp_ns: epoch.elapsed().as_nanos() as i64,
                            accuracy: ACCURACY_UNKNOWN,
                        };
                        // The pipeline dropping its receiver means shutdown.
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        self.cancel = Some(cancel);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}
