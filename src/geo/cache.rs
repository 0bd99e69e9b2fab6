// src/geo/cache.rs

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

use crate::errors::EngineError;

const GEOCODE_CATEGORY: &str = "geocode";

/// Tri-state cache read. A plain missing-key check is not enough here:
/// "looked up, nothing found" must be distinguishable from "never
/// looked up", or unresolvable city/state pairs would be re-geocoded
/// on every listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(String),
    /// Previous lookup found no zip for this key.
    Tombstone,
    Miss,
}

/// Persistent key-value store for geocode results, shared across
/// listing pipelines. Reads and writes degrade on I/O failure (Miss /
/// dropped write); only the operator-facing clear reports errors.
pub trait CacheStore: Send + Sync {
    fn get_geocode(&self, city: &str, state: &str) -> CacheLookup;
    /// Overwrites wholesale; `None` stores a not-found tombstone.
    fn put_geocode(&self, city: &str, state: &str, zip: Option<&str>);
    /// Wipe the geocode category, tombstones included. Returns the
    /// number of entries removed.
    fn clear_geocode(&self) -> Result<usize, EngineError>;
}

fn geocode_key(city: &str, state: &str) -> String {
    format!("{}|{}", city.trim().to_lowercase(), state.trim().to_lowercase())
}

/// SQLite-backed cache surviving process restarts. One table keyed by
/// (category, key); a NULL value is a tombstone. Other categories
/// (listing/evaluation/notification state) belong to other components;
/// this store only touches the geocode category.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let conn = Connection::open(path)
            .map_err(|e| EngineError::Cache(format!("Open cache DB failed: {e}")))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_cache (
                category TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT,
                created_at TEXT NOT NULL,
                PRIMARY KEY (category, key)
            )",
            [],
        )
        .map_err(|e| EngineError::Cache(format!("Init cache schema failed: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, EngineError> {
        let conn = match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&conn).map_err(|e| EngineError::Cache(e.to_string()))
    }
}

impl CacheStore for SqliteCache {
    fn get_geocode(&self, city: &str, state: &str) -> CacheLookup {
        let key = geocode_key(city, state);
        let result = self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_cache WHERE category = ?1 AND key = ?2",
                params![GEOCODE_CATEGORY, key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
        });
        match result {
            Ok(Some(Some(zip))) => CacheLookup::Hit(zip),
            Ok(Some(None)) => CacheLookup::Tombstone,
            Ok(None) => CacheLookup::Miss,
            Err(e) => {
                warn!("geocode cache read failed for {key}: {e}");
                CacheLookup::Miss
            }
        }
    }

    fn put_geocode(&self, city: &str, state: &str, zip: Option<&str>) {
        let key = geocode_key(city, state);
        let now = Utc::now().naive_utc().to_string();
        let result = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv_cache (category, key, value, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(category, key) DO UPDATE SET
                     value = excluded.value,
                     created_at = excluded.created_at",
                params![GEOCODE_CATEGORY, key, zip, now],
            )
        });
        if let Err(e) = result {
            warn!("geocode cache write failed for {key}: {e}");
        }
    }

    fn clear_geocode(&self) -> Result<usize, EngineError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM kv_cache WHERE category = ?1",
                params![GEOCODE_CATEGORY],
            )
        })
    }
}
