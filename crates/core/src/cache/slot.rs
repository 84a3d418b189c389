//! The single cache slot holding the last known catalog.
//!
//! The slot is a hint, not a source of truth: every storage failure is
//! logged and reported as a miss, never surfaced to the caller. Age
//! interpretation belongs to the catalog service; this layer only records
//! when the entry was written.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::LocalCache;
use crate::{Catalog, Error};

/// Well-known key the catalog record is stored under.
pub const CACHE_KEY: &str = "catalog_cache";

/// A cached catalog plus the moment it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub document: Catalog,
    pub written_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Age of the entry at `now`. Entries stamped in the future count as new.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.written_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }

    /// Whether the entry may be served without a blocking fetch.
    pub fn is_usable(&self) -> bool {
        !self.document.is_empty()
    }
}

/// Persisted record: `{ "apps": <catalog>, "timestamp": <epoch ms> }`.
#[derive(Serialize, Deserialize)]
struct CacheRecord {
    apps: Catalog,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
}

impl LocalCache {
    /// Read the cached entry.
    ///
    /// Returns None if nothing was written, the record is corrupt, or the
    /// storage layer failed.
    pub async fn get(&self) -> Option<CacheEntry> {
        match self.try_get().await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Replace the entry with `doc`, stamped now.
    pub async fn set(&self, doc: &Catalog) {
        self.set_at(doc, Utc::now()).await;
    }

    /// Replace the entry with an explicit write time.
    pub async fn set_at(&self, doc: &Catalog, written_at: DateTime<Utc>) {
        if let Err(e) = self.try_set(doc, written_at).await {
            tracing::warn!(error = %e, "cache write failed");
        }
    }

    /// Remove the entry.
    pub async fn clear(&self) {
        let result = self
            .conn
            .call(|conn| -> Result<(), Error> {
                conn.execute("DELETE FROM local_cache WHERE key = ?1", params![CACHE_KEY])?;
                Ok(())
            })
            .await
            .map_err(Error::from);

        if let Err(e) = result {
            tracing::warn!(error = %e, "cache clear failed");
        }
    }

    async fn try_get(&self) -> Result<Option<CacheEntry>, Error> {
        let payload = self
            .conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT payload FROM local_cache WHERE key = ?1",
                    params![CACHE_KEY],
                    |row| row.get(0),
                );

                match result {
                    Ok(payload) => Ok(Some(payload)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some(payload) = payload else {
            tracing::debug!("cache slot empty");
            return Ok(None);
        };

        match serde_json::from_str::<CacheRecord>(&payload) {
            Ok(record) => Ok(Some(CacheEntry { document: record.apps, written_at: record.timestamp })),
            Err(e) => {
                let err = Error::from(e);
                tracing::warn!(error = %err, "discarding unreadable cache record");
                Ok(None)
            }
        }
    }

    async fn try_set(&self, doc: &Catalog, written_at: DateTime<Utc>) -> Result<(), Error> {
        let record = CacheRecord { apps: doc.clone(), timestamp: written_at };
        let payload = serde_json::to_string(&record)?;
        let written_ms = written_at.timestamp_millis();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO local_cache (key, payload, written_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        payload = excluded.payload,
                        written_at = excluded.written_at",
                    params![CACHE_KEY, payload, written_ms],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
