//! Cover entry CRUD operations.

use super::connection::CoverStore;
use super::expiry::{is_fresh, stale_cutoff};
use super::{DB_NAME, STORE_NAME};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A cached cover image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CoverEntry {
    /// Source URL, the primary key.
    pub url: String,
    /// Self-contained `data:` URI for the image.
    pub data_url: String,
    /// Epoch milliseconds of the last write.
    pub timestamp: i64,
}

impl CoverEntry {
    pub fn new(url: impl Into<String>, data_url: impl Into<String>, timestamp: i64) -> Self {
        Self { url: url.into(), data_url: data_url.into(), timestamp }
    }

    /// Whether the entry is still within the expiry window at `now_ms`.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        is_fresh(self.timestamp, now_ms)
    }
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheStats {
    /// Number of entries currently stored, expired ones included.
    pub count: u64,
    pub db_name: String,
    pub store_name: String,
}

impl CoverStore {
    /// Insert or replace the entry for `entry.url`.
    pub async fn put_entry(&self, entry: &CoverEntry) -> Result<(), Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO covers (url, data_url, timestamp) VALUES (?1, ?2, ?3)
                     ON CONFLICT(url) DO UPDATE SET
                        data_url = excluded.data_url,
                        timestamp = excluded.timestamp",
                    params![&entry.url, &entry.data_url, entry.timestamp],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `url`, regardless of freshness.
    ///
    /// Returns None if the URL isn't cached.
    pub async fn get_entry(&self, url: &str) -> Result<Option<CoverEntry>, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CoverEntry>, Error> {
                let result = conn.query_row(
                    "SELECT url, data_url, timestamp FROM covers WHERE url = ?1",
                    params![url],
                    |row| Ok(CoverEntry { url: row.get(0)?, data_url: row.get(1)?, timestamp: row.get(2)? }),
                );

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for `url`.
    ///
    /// Returns true if a row was removed.
    pub async fn delete_entry(&self, url: &str) -> Result<bool, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM covers WHERE url = ?1", params![url])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for `url` only if it still carries `stored_at`.
    ///
    /// Lets a stale row be dropped without racing a newer write for the
    /// same URL. Returns true if a row was removed.
    pub async fn delete_stale_entry(&self, url: &str, stored_at: i64) -> Result<bool, Error> {
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM covers WHERE url = ?1 AND timestamp = ?2",
                    params![url, stored_at],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove every entry.
    ///
    /// Returns the number of deleted entries.
    pub async fn clear(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM covers", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of stored entries.
    pub async fn count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM covers", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry count plus the store identifiers.
    pub async fn stats(&self) -> Result<CacheStats, Error> {
        let count = self.count().await?;
        Ok(CacheStats { count, db_name: DB_NAME.to_string(), store_name: STORE_NAME.to_string() })
    }

    /// Delete every entry that is stale at `now_ms`.
    ///
    /// Uses the same window as lookups. Returns the number of deleted entries.
    pub async fn purge_expired(&self, now_ms: i64) -> Result<u64, Error> {
        let cutoff = stale_cutoff(now_ms);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM covers WHERE timestamp <= ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
