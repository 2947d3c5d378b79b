//! Remote synchronization of stored records.
//!
//! The engine drains unsynced rows in insertion order through an
//! [`Uploader`] in fixed-size batches. Rows are only purged or marked
//! synced after the uploader accepts the batch, so a failed upload leaves
//! them pending for the next sync request.

use std::future::Future;

use anyhow::{bail, Context, Result};
use log::info;

use crate::db::models::{LightDevice, LightSample};
use crate::db::Database;
use crate::storage::{SensorTable, SyncConfig};

/// Transport seam for sync uploads. The wire format is this crate's own
/// choice; the engine only cares whether a batch was accepted.
pub trait Uploader: Send + Sync + 'static {
    fn upload_samples(&self, batch: &[LightSample]) -> impl Future<Output = Result<()>> + Send;
    fn upload_devices(&self, batch: &[LightDevice]) -> impl Future<Output = Result<()>> + Send;
}

pub struct SyncEngine<U> {
    db: Database,
    uploader: U,
    batch_size: usize,
}

impl<U: Uploader> SyncEngine<U> {
    pub fn new(db: Database, uploader: U, batch_size: usize) -> Self {
        Self {
            db,
            uploader,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn run(&self, table: SensorTable, cfg: SyncConfig) -> Result<()> {
        match table {
            SensorTable::Samples => self.sync_samples(cfg).await,
            SensorTable::Devices => self.sync_devices(cfg).await,
        }
    }

    async fn sync_samples(&self, cfg: SyncConfig) -> Result<()> {
        let mut total = 0usize;
        loop {
            let batch = self.db.pending_samples(self.batch_size).await?;
            if batch.is_empty() {
                break;
            }

            self.uploader
                .upload_samples(&batch)
                .await
                .context("sample upload failed")?;

            let ids: Vec<i64> = batch.iter().filter_map(|sample| sample.id).collect();
            if cfg.remove_after_sync {
                self.db.delete_samples(ids).await?;
            } else {
                self.db.mark_samples_synced(ids).await?;
            }
            total += batch.len();
        }

        if total > 0 {
            info!("synced {total} light samples");
        }
        Ok(())
    }

    async fn sync_devices(&self, cfg: SyncConfig) -> Result<()> {
        let batch = self.db.pending_devices().await?;
        if batch.is_empty() {
            return Ok(());
        }

        self.uploader
            .upload_devices(&batch)
            .await
            .context("device descriptor upload failed")?;

        let ids: Vec<i64> = batch.iter().filter_map(|device| device.id).collect();
        if cfg.remove_after_sync {
            self.db.delete_devices(ids).await?;
        } else {
            self.db.mark_devices_synced(ids).await?;
        }

        info!("synced {} device descriptors", batch.len());
        Ok(())
    }
}

/// JSON-over-HTTP uploader: POSTs each batch as a JSON array to
/// `<endpoint>/light` or `<endpoint>/light_device`.
pub struct HttpUploader {
    endpoint: Option<String>,
    client: reqwest::Client,
}

impl HttpUploader {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
            client: reqwest::Client::new(),
        }
    }

    async fn post<T: serde::Serialize>(&self, table: &str, batch: &[T]) -> Result<()> {
        let Some(endpoint) = &self.endpoint else {
            bail!("no sync endpoint configured");
        };

        let url = format!("{endpoint}/{table}");
        let response = self
            .client
            .post(&url)
            .json(&batch)
            .send()
            .await
            .with_context(|| format!("sync request to {url} failed"))?;

        response
            .error_for_status()
            .with_context(|| format!("sync request to {url} rejected"))?;
        Ok(())
    }
}

impl Uploader for HttpUploader {
    async fn upload_samples(&self, batch: &[LightSample]) -> Result<()> {
        self.post("light", batch).await
    }

    async fn upload_devices(&self, batch: &[LightDevice]) -> Result<()> {
        self.post("light_device", batch).await
    }
}
