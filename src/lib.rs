//! luxlog: continuous ambient light sampling service.
//!
//! Reads a light sensor at a configurable rate, filters noisy or redundant
//! readings, buffers accepted samples, and periodically flushes them to a
//! local SQLite store for later synchronization to a remote endpoint.

pub mod config;
pub mod db;
pub mod pipeline;
pub mod sensor;
pub mod storage;
pub mod sync;
mod utils;

pub use config::{SensorConfig, SyncSettings};
pub use db::models::{LightDevice, LightSample};
pub use db::Database;
pub use pipeline::{PipelineStats, SampleObserver, SensorController, SensorNotification};
pub use sensor::{IioLightSensor, LightSensor, RawLightEvent, SensorInfo};
pub use storage::{SensorStore, SensorTable, SqliteStore, SyncConfig};
pub use sync::{HttpUploader, SyncEngine, Uploader};
