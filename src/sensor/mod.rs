//! Sensor subsystem seam.
//!
//! The pipeline consumes raw events from anything implementing
//! [`LightSensor`]; the Linux IIO sysfs implementation lives in [`iio`].

mod iio;

pub use iio::IioLightSensor;

use anyhow::Result;
use tokio::sync::mpsc;

/// Accuracy code for sources that expose no accuracy channel.
pub const ACCURACY_UNKNOWN: i32 = -1;

/// One raw reading as delivered by the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawLightEvent {
    /// Illuminance in lux.
    pub value: f32,
    /// Monotonic driver timestamp in nanoseconds.
    pub timestamp_ns: i64,
    pub accuracy: i32,
}

/// Hardware capability snapshot, taken once at startup.
#[derive(Debug, Clone)]
pub struct SensorInfo {
    pub max_range: f32,
    /// Minimum delay between events, microseconds.
    pub min_delay: f32,
    pub name: String,
    pub power: f32,
    pub resolution: f32,
    pub sensor_type: String,
    pub vendor: String,
    pub version: String,
}

/// A source of raw light events.
///
/// `start` registers the requested sampling rate (0 = fastest the source
/// supports) and begins delivering events on `tx`; `stop` halts delivery
/// and drops the sender so the pipeline can drain its queue and exit.
pub trait LightSensor: Send {
    fn info(&self) -> Result<SensorInfo>;
    fn start(&mut self, interval_hz: u32, tx: mpsc::Sender<RawLightEvent>) -> Result<()>;
    fn stop(&mut self);
}
