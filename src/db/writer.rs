// src/db/writer.rs

use chrono::Utc;
use rusqlite::types::Value;
use std::sync::Arc;
use tracing::info;

use crate::config::{valid_ident, CompareConfig};
use crate::db::executor::SqlExecutor;
use crate::domain::geo::GeoIdentity;
use crate::domain::listing::{ExtractedAttributes, Listing};
use crate::errors::EngineError;
use crate::extract;

/// Writes evaluated listings back into the store. Each write is an
/// independent, idempotent operation; failures are returned to the
/// caller and never abort the enclosing evaluation loop.
pub struct PersistenceWriter {
    db: Arc<dyn SqlExecutor>,
    config: Arc<CompareConfig>,
}

impl PersistenceWriter {
    pub fn new(db: Arc<dyn SqlExecutor>, config: Arc<CompareConfig>) -> Self {
        Self { db, config }
    }

    /// By default only accepted listings are written; the
    /// insert_all_evaluated flag widens that to every evaluated one.
    pub fn should_persist(&self, accepted: bool) -> bool {
        self.config.insert_into_fb && (accepted || self.config.insert_all_evaluated)
    }

    /// Insert-or-update keyed on the listing's external id. Unknown
    /// fields are written as NULL, never forced to a default.
    pub fn upsert_listing(
        &self,
        listing: &Listing,
        attrs: &ExtractedAttributes,
        geo: &GeoIdentity,
    ) -> Result<(), EngineError> {
        let table = &self.config.fb_listings_table;
        if !valid_ident(table) {
            return Err(EngineError::Config(format!(
                "fb_listings_table is not a valid identifier: {table:?}"
            )));
        }

        let (city, state) = extract::parse_location(&listing.location);
        let now = Utc::now().naive_utc().to_string();

        let sql = format!(
            "INSERT INTO {table} (external_id, title, description, asking_price, \
             city, state, zip, url, beds, baths, county_id, region_id, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13) \
             ON CONFLICT(external_id) DO UPDATE SET \
                 title = excluded.title, \
                 description = excluded.description, \
                 asking_price = excluded.asking_price, \
                 city = excluded.city, \
                 state = excluded.state, \
                 zip = excluded.zip, \
                 url = excluded.url, \
                 beds = excluded.beds, \
                 baths = excluded.baths, \
                 county_id = excluded.county_id, \
                 region_id = excluded.region_id, \
                 updated_at = excluded.updated_at"
        );

        let params = [
            Value::Text(listing.id.clone()),
            opt_text(clamp(&listing.title, 500)),
            opt_text(clamp(&listing.description, 10_000)),
            opt_real(listing.price),
            opt_text(city.as_deref().and_then(|c| clamp(c, 200))),
            opt_text(state.as_deref().and_then(|s| clamp(s, 10))),
            opt_text(geo.zip.as_deref().and_then(|z| clamp(z, 10))),
            opt_text(clamp(&listing.url, 2000)),
            opt_int(attrs.beds),
            opt_real(attrs.baths),
            opt_int(geo.county_id),
            opt_int(geo.region_id),
            Value::Text(now),
        ];

        self.db.execute(&sql, &params)?;
        info!("upserted listing {} into {table}", listing.id);
        Ok(())
    }

    /// Append-only price history row, keyed loosely by external id +
    /// timestamp. Independent of the main upsert; a no-op when the
    /// history table is not configured.
    pub fn record_price_history(&self, listing: &Listing) -> Result<(), EngineError> {
        let table = &self.config.fb_listing_history_table;
        if table.is_empty() {
            return Ok(());
        }
        if !valid_ident(table) {
            return Err(EngineError::Config(format!(
                "fb_listing_history_table is not a valid identifier: {table:?}"
            )));
        }

        let sql = format!(
            "INSERT INTO {table} (external_id, asking_price, seen_at) VALUES (?1, ?2, ?3)"
        );
        let params = [
            Value::Text(listing.id.clone()),
            opt_real(listing.price),
            Value::Text(Utc::now().naive_utc().to_string()),
        ];
        self.db.execute(&sql, &params)?;
        Ok(())
    }
}

/// Character-bounded copy of a text field; empty becomes None so the
/// column lands as NULL.
fn clamp(text: &str, max_chars: usize) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(max_chars).collect())
}

fn opt_text(value: Option<String>) -> Value {
    value.map(Value::Text).unwrap_or(Value::Null)
}

fn opt_int(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

fn opt_real(value: Option<f64>) -> Value {
    value.map(Value::Real).unwrap_or(Value::Null)
}
