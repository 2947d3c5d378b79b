use anyhow::{Context, Result};
use rusqlite::{params, Row, ToSql};

use crate::db::{connection::Database, models::LightSample};

fn row_to_sample(row: &Row) -> Result<LightSample> {
    Ok(LightSample {
        id: row.get("id")?,
        device_id: row.get("device_id")?,
        label: row.get("label")?,
        timestamp: row.get("timestamp")?,
        event_timestamp: row.get("event_timestamp")?,
        light: row.get::<_, f64>("light")? as f32,
        accuracy: row.get("accuracy")?,
    })
}

impl Database {
    /// Persist one flushed batch in a single transaction.
    pub async fn insert_samples(&self, samples: Vec<LightSample>) -> Result<usize> {
        if samples.is_empty() {
            return Ok(0);
        }
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open sample batch transaction")?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO light_samples
                         (device_id, label, timestamp, event_timestamp, light, accuracy)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for sample in &samples {
                    stmt.execute(params![
                        sample.device_id,
                        sample.label,
                        sample.timestamp,
                        sample.event_timestamp,
                        f64::from(sample.light),
                        sample.accuracy,
                    ])?;
                }
            }
            tx.commit().context("failed to commit sample batch")?;
            Ok(samples.len())
        })
        .await
    }

    /// Unsynced samples in insertion order, up to `limit` rows.
    pub async fn pending_samples(&self, limit: usize) -> Result<Vec<LightSample>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, device_id, label, timestamp, event_timestamp, light, accuracy
                 FROM light_samples
                 WHERE synced = 0
                 ORDER BY id ASC
                 LIMIT ?1",
            )?;

            let mut rows = stmt.query(params![limit as i64])?;
            let mut samples = Vec::new();
            while let Some(row) = rows.next()? {
                samples.push(row_to_sample(row)?);
            }

            Ok(samples)
        })
        .await
    }

    pub async fn delete_samples(&self, ids: Vec<i64>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.execute(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let query = format!("DELETE FROM light_samples WHERE id IN ({placeholders})");
            let params_refs: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
            let deleted = conn
                .execute(&query, params_refs.as_slice())
                .context("failed to delete synced samples")?;
            Ok(deleted)
        })
        .await
    }

    pub async fn mark_samples_synced(&self, ids: Vec<i64>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.execute(move |conn| {
            let placeholders = vec!["?"; ids.len()].join(", ");
            let query =
                format!("UPDATE light_samples SET synced = 1 WHERE id IN ({placeholders})");
            let params_refs: Vec<&dyn ToSql> = ids.iter().map(|id| id as &dyn ToSql).collect();
            let updated = conn
                .execute(&query, params_refs.as_slice())
                .context("failed to mark samples synced")?;
            Ok(updated)
        })
        .await
    }

    pub async fn count_samples(&self) -> Result<i64> {
        self.execute(|conn| {
            conn.query_row("SELECT COUNT(*) FROM light_samples", [], |row| row.get(0))
                .context("failed to count samples")
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: i64, light: f32) -> LightSample {
        LightSample {
            id: None,
            device_id: "test-device".into(),
            label: "bench".into(),
            timestamp,
            event_timestamp: timestamp * 1_000_000,
            light,
            accuracy: -1,
        }
    }

    #[tokio::test]
    async fn batch_insert_then_pending_preserves_order() {
        let db = Database::open_in_memory().expect("db");
        let inserted = db
            .insert_samples(vec![sample(1, 10.0), sample(2, 20.0), sample(3, 30.0)])
            .await
            .expect("insert");
        assert_eq!(inserted, 3);

        let pending = db.pending_samples(10).await.expect("pending");
        assert_eq!(pending.len(), 3);
        let timestamps: Vec<i64> = pending.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![1, 2, 3]);
        assert_eq!(pending[1].light, 20.0);
        assert!(pending.iter().all(|s| s.id.is_some()));
    }

    #[tokio::test]
    async fn pending_respects_limit() {
        let db = Database::open_in_memory().expect("db");
        db.insert_samples((0..5).map(|i| sample(i, i as f32)).collect())
            .await
            .expect("insert");

        let pending = db.pending_samples(2).await.expect("pending");
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].timestamp, 0);
        assert_eq!(pending[1].timestamp, 1);
    }

    #[tokio::test]
    async fn delete_removes_only_given_ids() {
        let db = Database::open_in_memory().expect("db");
        db.insert_samples(vec![sample(1, 1.0), sample(2, 2.0), sample(3, 3.0)])
            .await
            .expect("insert");

        let pending = db.pending_samples(10).await.expect("pending");
        let first_two: Vec<i64> = pending.iter().take(2).filter_map(|s| s.id).collect();
        let deleted = db.delete_samples(first_two).await.expect("delete");
        assert_eq!(deleted, 2);

        let remaining = db.pending_samples(10).await.expect("pending");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].timestamp, 3);
    }

    #[tokio::test]
    async fn marked_synced_rows_leave_the_pending_set_but_stay_stored() {
        let db = Database::open_in_memory().expect("db");
        db.insert_samples(vec![sample(1, 1.0), sample(2, 2.0)])
            .await
            .expect("insert");

        let ids: Vec<i64> = db
            .pending_samples(10)
            .await
            .expect("pending")
            .iter()
            .filter_map(|s| s.id)
            .collect();
        db.mark_samples_synced(ids).await.expect("mark");

        assert!(db.pending_samples(10).await.expect("pending").is_empty());
        assert_eq!(db.count_samples().await.expect("count"), 2);
    }
}
