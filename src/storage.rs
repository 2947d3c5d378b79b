//! Storage collaborator seam.
//!
//! The pipeline writes through [`SensorStore`] and never touches SQLite
//! directly; [`SqliteStore`] is the production implementation, tests
//! substitute mocks.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::db::models::{LightDevice, LightSample};
use crate::db::Database;
use crate::sync::{SyncEngine, Uploader};

/// Logical tables exposed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorTable {
    Samples,
    Devices,
}

/// Per-table sync behavior. Samples default to purge-after-sync; device
/// descriptors are synced with `remove_after_sync = false` so the one-time
/// hardware snapshot survives locally.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    pub remove_after_sync: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remove_after_sync: true,
        }
    }
}

pub trait SensorStore: Send + Sync + 'static {
    /// Persist one flushed batch as a single write.
    fn save_samples(
        &self,
        samples: Vec<LightSample>,
    ) -> impl Future<Output = Result<usize>> + Send;

    /// Persist the one-time device descriptor.
    fn save_device(&self, device: LightDevice) -> impl Future<Output = Result<()>> + Send;

    /// Upload pending rows of `table` per `cfg`.
    fn start_sync(
        &self,
        table: SensorTable,
        cfg: SyncConfig,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// A hung write would stall the worker indefinitely; bound it.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SqliteStore<U: Uploader> {
    db: Database,
    sync: SyncEngine<U>,
}

impl<U: Uploader> SqliteStore<U> {
    pub fn new(db: Database, sync: SyncEngine<U>) -> Self {
        Self { db, sync }
    }
}

impl<U: Uploader> SensorStore for SqliteStore<U> {
    async fn save_samples(&self, samples: Vec<LightSample>) -> Result<usize> {
        tokio::time::timeout(WRITE_TIMEOUT, self.db.insert_samples(samples))
            .await
            .map_err(|_| anyhow!("sample batch write timed out after {WRITE_TIMEOUT:?}"))?
    }

    async fn save_device(&self, device: LightDevice) -> Result<()> {
        tokio::time::timeout(WRITE_TIMEOUT, self.db.insert_device(&device))
            .await
            .map_err(|_| anyhow!("device descriptor write timed out after {WRITE_TIMEOUT:?}"))?
            .map(|_| ())
    }

    async fn start_sync(&self, table: SensorTable, cfg: SyncConfig) -> Result<()> {
        self.sync.run(table, cfg).await
    }
}
