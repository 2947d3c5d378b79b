use anyhow::{Context, Result};
use rusqlite::{params, Row, ToSql};

use crate::db::{connection::Database, models::LightDevice};

fn row_to_device(row: &Row) -> Result<LightDevice> {
    Ok(LightDevice {
        id: row.get("id")?,
        device_id: row.get("device_id")?,
        label: row.get("label")?,
        timestamp: row.get("timestamp")?,
        max_range: row.get::<_, f64>("max_range")? as f32,
        min_delay: row.get::<_, f64>("min_delay")? as f32,
        name: row.get("name")?,
        power: row.get::<_, f64>("power")? as f32,
        resolution: row.get::<_, f64>("resolution")? as f32,
        sensor_type: row.get("sensor_type")?,
        vendor: row.get("vendor")?,
        version: row.get("version")?,
    })
}

impl Database {
    pub async fn insert_device(&self, device: &LightDevice) -> Result<i64> {
        let record = device.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO light_devices
                     (device_id, label, timestamp, max_range, min_delay, name,
                      power, resolution, sensor_type, vendor, version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.device_id,
                    record.label,
                    record.timestamp,
                    f64::from(record.max_range),
                    f64::from(record.min_delay),
                    record.name,
                    f64::from(record.power),
                    f64::from(record.resolution),
                    record.sensor_type,
                    record.vendor,
                    record.version,
                ],
            )
            .context("failed to insert device descriptor")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Unsynced device descriptors in insertion order.
    pub async fn pending_devices(&self) -> Result<Vec<LightDevice>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, device_id, label, timestamp, max_range, min_delay, name,
                        power, resolution, sensor_type, vendor, version
                 FROM light_devices
                 WHERE synced = 0
                 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut devices = Vec::new();
            while let Some(row) = rows.next()? {
                devices.push(row_to_device(row)?);
            }

            Ok(devices)
        })
        .await
    }

    pub async fn mark_devices_synced(&self, ids: Vec<i64>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.execute(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let query =
                format!("UPDATE light_devices SET synced = 1 WHERE id IN ({placeholders})");
            let params_refs: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
            let updated = conn
                .execute(&query, params_refs.as_slice())
                .context("failed to mark device descriptors synced")?;
            Ok(updated)
        })
        .await
    }

    pub async fn delete_devices(&self, ids: Vec<i64>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.execute(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let query = format!("DELETE FROM light_devices WHERE id IN ({placeholders})");
            let params_refs: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
            let deleted = conn
                .execute(&query, params_refs.as_slice())
                .context("failed to delete device descriptors")?;
            Ok(deleted)
        })
        .await
    }

    pub async fn count_devices(&self) -> Result<i64> {
        self.execute(|conn| {
            conn.query_row("SELECT COUNT(*) FROM light_devices", [], |row| row.get(0))
                .context("failed to count device descriptors")
        })
        .await
    }
}
