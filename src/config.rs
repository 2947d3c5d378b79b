use std::{env, fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const DEFAULT_CONFIG_PATH: &str = "luxlog.json";
const DEFAULT_SENSOR_PATH: &str = "/sys/bus/iio/devices/iio:device0";
const DEFAULT_SYNC_BATCH_SIZE: usize = 500;

/// Remote synchronization settings. With no endpoint configured, sync
/// requests are rejected but sampling is unaffected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettings {
    pub endpoint: Option<String>,
    /// Rows uploaded per request.
    pub batch_size: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            batch_size: DEFAULT_SYNC_BATCH_SIZE,
        }
    }
}

/// Sampling service configuration.
///
/// Loaded once at startup and immutable while the pipeline runs, except
/// `label`, which has its own update path on the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SensorConfig {
    /// Stable identifier stamped on every stored record.
    pub device_id: String,
    /// Free-form tag stamped on records, updatable while running.
    pub label: String,
    /// Sampling rate in samples per second; 0 records as fast as the
    /// driver delivers.
    pub interval_hz: u32,
    /// Buffer flush period in minutes.
    pub flush_period_min: f64,
    /// Minimum change in lux between consecutive recorded samples; 0
    /// records every throttle-passed event.
    pub threshold: f64,
    /// Enables verbose per-event diagnostics.
    pub debug: bool,
    pub db_path: PathBuf,
    /// IIO device directory holding the illuminance channel.
    pub sensor_path: PathBuf,
    pub sync: SyncSettings,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            device_id: Uuid::new_v4().to_string(),
            label: String::new(),
            interval_hz: 5,
            flush_period_min: 1.0,
            threshold: 0.0,
            debug: false,
            db_path: PathBuf::from("luxlog.sqlite3"),
            sensor_path: PathBuf::from(DEFAULT_SENSOR_PATH),
            sync: SyncSettings::default(),
        }
    }
}

impl SensorConfig {
    /// Load configuration from a JSON file. The path defaults to
    /// `luxlog.json`, overridable via `LUXLOG_CONFIG`; a missing file
    /// falls back to defaults. `LUXLOG_DB_PATH` overrides the database
    /// location either way.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path
            .or_else(|| env::var("LUXLOG_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config: Self = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read config from {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("failed to parse config {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(db_path) = env::var("LUXLOG_DB_PATH") {
            let trimmed = db_path.trim();
            if !trimmed.is_empty() {
                config.db_path = PathBuf::from(trimmed);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.device_id.is_empty() {
            bail!("deviceId must not be empty");
        }
        if self.flush_period_min <= 0.0 {
            bail!("flushPeriodMin must be greater than zero");
        }
        if self.threshold < 0.0 {
            bail!("threshold must not be negative");
        }
        if self.sync.batch_size == 0 {
            bail!("sync batchSize must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SensorConfig::default();
        config.validate().expect("defaults should validate");
        assert_eq!(config.interval_hz, 5);
        assert_eq!(config.flush_period_min, 1.0);
        assert_eq!(config.threshold, 0.0);
        assert!(!config.debug);
    }

    #[test]
    fn rejects_non_positive_flush_period() {
        let config = SensorConfig {
            flush_period_min: 0.0,
            ..SensorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_negative_threshold() {
        let config = SensorConfig {
            threshold: -0.5,
            ..SensorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("luxlog.json");
        fs::write(
            &path,
            r#"{"label": "office", "intervalHz": 20, "threshold": 2.5}"#,
        )
        .expect("write config");

        let config = SensorConfig::load(Some(path)).expect("load config");
        assert_eq!(config.label, "office");
        assert_eq!(config.interval_hz, 20);
        assert_eq!(config.threshold, 2.5);
        // Untouched fields keep their defaults.
        assert_eq!(config.flush_period_min, 1.0);
        assert!(!config.device_id.is_empty());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = SensorConfig::load(Some(dir.path().join("absent.json"))).expect("load");
        assert_eq!(config.interval_hz, 5);
    }
}
