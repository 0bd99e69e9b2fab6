use rusqlite::types::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::executor::{SqlExecutor, SqliteExecutor};
use crate::domain::listing::Listing;
use crate::errors::EngineError;
use crate::geo::cache::{CacheLookup, CacheStore};
use crate::geo::geocode::Geocoder;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Fresh in-memory database with the production schema applied.
/// Also wires up test-visible tracing output (RUST_LOG aware).
pub fn make_db() -> Arc<SqliteExecutor> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let db = SqliteExecutor::open_in_memory().expect("open in-memory DB");
    db.init_schema(SCHEMA_SQL).expect("apply schema");
    Arc::new(db)
}

/// Unique throwaway path for tests that need an on-disk database.
pub fn temp_db_path(prefix: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "{prefix}_{}.sqlite",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

pub fn exec(db: &Arc<SqliteExecutor>, sql: &str, params: &[Value]) {
    db.execute(sql, params).unwrap_or_else(|e| panic!("seed failed: {e}"));
}

pub fn make_listing(title: &str, description: &str, location: &str, price: Option<f64>) -> Listing {
    Listing {
        id: "test:1".to_string(),
        title: title.to_string(),
        description: description.to_string(),
        price,
        location: location.to_string(),
        posted_at: None,
        url: "https://example.com/listing/1".to_string(),
    }
}

/// In-memory cache; also the trait's reference for the geocode tests.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Option<String>>>,
}

impl CacheStore for MemoryCache {
    fn get_geocode(&self, city: &str, state: &str) -> CacheLookup {
        let key = format!("{}|{}", city.trim().to_lowercase(), state.trim().to_lowercase());
        match self.entries.lock().unwrap().get(&key) {
            Some(Some(zip)) => CacheLookup::Hit(zip.clone()),
            Some(None) => CacheLookup::Tombstone,
            None => CacheLookup::Miss,
        }
    }

    fn put_geocode(&self, city: &str, state: &str, zip: Option<&str>) {
        let key = format!("{}|{}", city.trim().to_lowercase(), state.trim().to_lowercase());
        self.entries
            .lock()
            .unwrap()
            .insert(key, zip.map(|z| z.to_string()));
    }

    fn clear_geocode(&self) -> Result<usize, EngineError> {
        let mut entries = self.entries.lock().unwrap();
        let n = entries.len();
        entries.clear();
        Ok(n)
    }
}

/// Canned geocoder that counts outbound calls.
pub struct FakeGeocoder {
    pub zip: Option<String>,
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl FakeGeocoder {
    pub fn returning(zip: &str) -> Self {
        Self {
            zip: Some(zip.to_string()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn not_found() -> Self {
        Self {
            zip: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            zip: None,
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for FakeGeocoder {
    fn lookup_zip(&self, _city: &str, _state: &str) -> Result<Option<String>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EngineError::Geocode("simulated network failure".to_string()));
        }
        Ok(self.zip.clone())
    }
}
