//! SQLite-backed mapping store.
//!
//! One `associations` table keyed by `(identity_id, image_key)`; writes are
//! idempotent upserts. All access goes through a single tokio-rusqlite
//! connection task.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use facelink_core::capability::{MappingStore, MappingStoreError};
use facelink_core::types::{AssociationRecord, IdentitySummary, ImageSummary};
use std::path::Path;
use tokio_rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS associations (
    identity_id   TEXT NOT NULL,
    image_key     TEXT NOT NULL,
    thumbnail_url TEXT NOT NULL,
    thumbnail_id  TEXT NOT NULL,
    recorded_at   TEXT NOT NULL,
    PRIMARY KEY (identity_id, image_key)
);
CREATE INDEX IF NOT EXISTS idx_associations_image ON associations (image_key);
";

pub struct SqliteMappingStore {
    conn: Connection,
}

impl SqliteMappingStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self, MappingStoreError> {
        let conn = Connection::open(path).await.map_err(store_err)?;
        let store = Self { conn };
        store.init().await?;
        tracing::info!(path = %path.display(), "mapping store opened");
        Ok(store)
    }

    /// In-memory database, used by tests.
    pub async fn open_in_memory() -> Result<Self, MappingStoreError> {
        let conn = Connection::open_in_memory().await.map_err(store_err)?;
        let store = Self { conn };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), MappingStoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await
            .map_err(store_err)
    }
}

fn store_err(err: tokio_rusqlite::Error) -> MappingStoreError {
    MappingStoreError::Unavailable(err.to_string())
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssociationRecord> {
    let recorded_at: String = row.get(4)?;
    let timestamp = DateTime::parse_from_rfc3339(&recorded_at)
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })?
        .with_timezone(&Utc);
    Ok(AssociationRecord {
        identity_id: row.get(0)?,
        image_key: row.get(1)?,
        thumbnail_url: row.get(2)?,
        thumbnail_id: row.get(3)?,
        timestamp,
    })
}

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn upsert(&self, record: &AssociationRecord) -> Result<(), MappingStoreError> {
        let record = record.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO associations
                         (identity_id, image_key, thumbnail_url, thumbnail_id, recorded_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT (identity_id, image_key) DO UPDATE SET
                         thumbnail_url = excluded.thumbnail_url,
                         thumbnail_id  = excluded.thumbnail_id,
                         recorded_at   = excluded.recorded_at",
                    rusqlite::params![
                        record.identity_id,
                        record.image_key,
                        record.thumbnail_url,
                        record.thumbnail_id,
                        record.timestamp.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(store_err)
    }

    async fn query_by_identity(
        &self,
        identity_id: &str,
    ) -> Result<Vec<AssociationRecord>, MappingStoreError> {
        let identity_id = identity_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT identity_id, image_key, thumbnail_url, thumbnail_id, recorded_at
                     FROM associations WHERE identity_id = ?1
                     ORDER BY recorded_at DESC, image_key",
                )?;
                let records = stmt
                    .query_map([identity_id], record_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
            .map_err(store_err)
    }

    async fn query_by_image(
        &self,
        image_key: &str,
    ) -> Result<Vec<AssociationRecord>, MappingStoreError> {
        let image_key = image_key.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT identity_id, image_key, thumbnail_url, thumbnail_id, recorded_at
                     FROM associations WHERE image_key = ?1
                     ORDER BY identity_id",
                )?;
                let records = stmt
                    .query_map([image_key], record_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
            .map_err(store_err)
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>, MappingStoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT image_key, MAX(recorded_at), COUNT(*)
                     FROM associations GROUP BY image_key
                     ORDER BY MAX(recorded_at) DESC, image_key",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        let recorded_at: String = row.get(1)?;
                        let timestamp = DateTime::parse_from_rfc3339(&recorded_at)
                            .map_err(|err| {
                                rusqlite::Error::FromSqlConversionFailure(
                                    1,
                                    rusqlite::types::Type::Text,
                                    Box::new(err),
                                )
                            })?
                            .with_timezone(&Utc);
                        Ok(ImageSummary {
                            image_key: row.get(0)?,
                            timestamp,
                            identity_count: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(summaries)
            })
            .await
            .map_err(store_err)
    }

    async fn list_identities(&self) -> Result<Vec<IdentitySummary>, MappingStoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT identity_id, MIN(thumbnail_url), COUNT(*)
                     FROM associations GROUP BY identity_id
                     ORDER BY identity_id",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        Ok(IdentitySummary {
                            identity_id: row.get(0)?,
                            thumbnail_url: row.get(1)?,
                            image_count: row.get::<_, i64>(2)? as u64,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(summaries)
            })
            .await
            .map_err(store_err)
    }

    async fn purge(&self) -> Result<u64, MappingStoreError> {
        self.conn
            .call(|conn| {
                let removed = conn.execute("DELETE FROM associations", [])?;
                Ok(removed as u64)
            })
            .await
            .map_err(store_err)
    }
}
