// src/geo/resolver.rs

use rusqlite::types::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{valid_ident, CompareConfig};
use crate::db::executor::SqlExecutor;
use crate::domain::geo::{GeoIdentity, ResolutionSource};
use crate::extract;
use crate::geo::cache::{CacheLookup, CacheStore};
use crate::geo::geocode::Geocoder;
use crate::geo::rate_limit::RateGate;

/// Resolves a listing's geographic identity through an ordered chain:
/// explicit zip in the text, then the local city_zip table, then the
/// remote geocoder (cache-first, rate-gated). First hit wins.
///
/// The gate and cache are shared across every pipeline holding a clone
/// of this resolver, so concurrent listings still serialize their
/// outbound geocode calls.
#[derive(Clone)]
pub struct GeoResolver {
    db: Arc<dyn SqlExecutor>,
    cache: Arc<dyn CacheStore>,
    geocoder: Option<Arc<dyn Geocoder>>,
    gate: Arc<RateGate>,
    config: Arc<CompareConfig>,
}

impl GeoResolver {
    pub fn new(
        db: Arc<dyn SqlExecutor>,
        cache: Arc<dyn CacheStore>,
        geocoder: Option<Arc<dyn Geocoder>>,
        config: Arc<CompareConfig>,
    ) -> Self {
        let gate = Arc::new(RateGate::new(config.geocode_rate_limit_seconds));
        Self {
            db,
            cache,
            geocoder,
            gate,
            config,
        }
    }

    /// Resolve listing text plus pre-parsed city/state to a GeoIdentity.
    /// Never errors: exhaustion of every tier is `Unresolved`, not a
    /// failure.
    pub fn resolve(
        &self,
        listing_text: &str,
        city: Option<&str>,
        state: Option<&str>,
    ) -> GeoIdentity {
        if let Some(zip) = extract::extract_zip(listing_text) {
            debug!("explicit zip {zip} found in listing text");
            return self.identity_for(zip, ResolutionSource::ExplicitText);
        }

        if let (Some(city), Some(state)) = (city, state) {
            if let Some(zip) = self.local_lookup(city, state) {
                debug!("local city_zip lookup hit: {city}, {state} -> {zip}");
                return self.identity_for(zip, ResolutionSource::LocalLookup);
            }
            if self.config.geocode_fallback {
                if let Some(zip) = self.remote_lookup(city, state) {
                    debug!("remote geocode: {city}, {state} -> {zip}");
                    return self.identity_for(zip, ResolutionSource::RemoteGeocode);
                }
            }
        }

        GeoIdentity::unresolved()
    }

    fn identity_for(&self, zip: String, source: ResolutionSource) -> GeoIdentity {
        let (county_id, region_id) = self.resolve_county_region(&zip);
        GeoIdentity {
            zip: Some(zip),
            county_id,
            region_id,
            source,
        }
    }

    /// Exact case-normalized match against the city_zip table. Multiple
    /// rows for one (city, state) are tie-broken by lowest zip so the
    /// pick is deterministic.
    fn local_lookup(&self, city: &str, state: &str) -> Option<String> {
        let table = &self.config.city_zip_table;
        if !valid_ident(table) {
            return None;
        }
        let sql = format!(
            "SELECT zip FROM {table} WHERE LOWER(city) = ?1 AND LOWER(state) = ?2 \
             ORDER BY zip LIMIT 1"
        );
        let params = [
            Value::Text(city.trim().to_lowercase()),
            Value::Text(state.trim().to_lowercase()),
        ];
        match self.db.query(&sql, &params) {
            Ok(rows) => rows.first().and_then(|r| r.get_str("zip")),
            Err(e) => {
                warn!("city_zip lookup failed for {city}, {state}: {e}");
                None
            }
        }
    }

    /// Cache-first remote geocode. A cache miss claims the global rate
    /// slot, calls out, and writes the result back; a failed or empty
    /// call is tombstoned so the same pair is never retried remotely.
    fn remote_lookup(&self, city: &str, state: &str) -> Option<String> {
        let geocoder = self.geocoder.as_ref()?;

        match self.cache.get_geocode(city, state) {
            CacheLookup::Hit(zip) => return Some(zip),
            CacheLookup::Tombstone => return None,
            CacheLookup::Miss => {}
        }

        self.gate.acquire();
        match geocoder.lookup_zip(city, state) {
            Ok(Some(zip)) => {
                self.cache.put_geocode(city, state, Some(&zip));
                Some(zip)
            }
            Ok(None) => {
                self.cache.put_geocode(city, state, None);
                None
            }
            Err(e) => {
                warn!("remote geocode failed for {city}, {state}: {e}");
                self.cache.put_geocode(city, state, None);
                None
            }
        }
    }

    /// zip -> county and county -> region, each an independent
    /// may-be-absent lookup. A missing county never blocks a zip-only
    /// identity.
    pub fn resolve_county_region(&self, zip: &str) -> (Option<i64>, Option<i64>) {
        let county_id = self.lookup_one(
            &self.config.zip_county_table,
            "county_id",
            "zip",
            Value::Text(zip.to_string()),
        );
        let region_id = match county_id {
            Some(county_id) => self.lookup_one(
                &self.config.counties_table,
                "region_id",
                "id",
                Value::Integer(county_id),
            ),
            None => None,
        };
        (county_id, region_id)
    }

    fn lookup_one(&self, table: &str, select: &str, filter: &str, key: Value) -> Option<i64> {
        if !valid_ident(table) {
            return None;
        }
        let sql = format!("SELECT {select} FROM {table} WHERE {filter} = ?1 LIMIT 1");
        match self.db.query(&sql, &[key]) {
            Ok(rows) => rows.first().and_then(|r| r.get_i64(select)),
            Err(e) => {
                warn!("{table} lookup failed: {e}");
                None
            }
        }
    }
}
