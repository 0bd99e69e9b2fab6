// src/config.rs

use serde::Deserialize;

use crate::errors::EngineError;

/// How much of the comparison summary is surfaced to the downstream
/// evaluator. Affects presentation only, never the queries themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Full,
    Short,
    None,
}

/// Configuration consumed by the comparison engine. Every table and
/// column name is injected here; the engine never hardcodes a schema.
///
/// Deserializable from whatever config layer the caller uses (TOML,
/// JSON); every field has a default so a partial block is valid.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    // --- Sales comps (sold properties): zip -> county -> region
    pub use_sales_comps: bool,
    pub sales_max_rows: usize,
    pub sales_table: String,
    pub properties_table: String,
    pub zip_county_table: String,
    pub counties_table: String,
    /// Year tolerance for the year_built filter (e.g. ±5 years).
    pub year_tolerance: i64,

    // --- Built-in comparison against prior marketplace listings
    /// Empty disables the built-in comparison.
    pub comparison_table: String,
    pub title_column: String,
    /// None disables the price ceiling filter.
    pub price_column: Option<String>,
    pub max_rows: usize,
    /// Custom query with {title}, {price}, {location}, {item_name}
    /// placeholders. Non-empty replaces the built-in comparison.
    pub comparison_query: String,

    // --- Persisting evaluated listings
    pub insert_into_fb: bool,
    /// When true, persist every evaluated listing, not only accepted ones.
    pub insert_all_evaluated: bool,
    pub fb_listings_table: String,
    /// Empty disables price-history rows.
    pub fb_listing_history_table: String,

    // --- Geographic resolution
    /// Local city/state -> zip lookup table.
    pub city_zip_table: String,
    pub geocode_fallback: bool,
    /// Minimum interval between outbound geocode calls, shared globally.
    pub geocode_rate_limit_seconds: f64,

    // --- Lot rent annotation
    /// Empty disables the annotation.
    pub lot_rent_table: String,
    pub lot_rent_zip_column: String,
    pub lot_rent_county_column: String,
    pub lot_rent_region_column: String,
    pub lot_rent_value_column: String,

    pub output_format: OutputFormat,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            use_sales_comps: false,
            sales_max_rows: 10,
            sales_table: "sales".to_string(),
            properties_table: "properties".to_string(),
            zip_county_table: "zip_county".to_string(),
            counties_table: "counties".to_string(),
            year_tolerance: 5,
            comparison_table: String::new(),
            title_column: "title".to_string(),
            price_column: Some("price".to_string()),
            max_rows: 10,
            comparison_query: String::new(),
            insert_into_fb: false,
            insert_all_evaluated: false,
            fb_listings_table: "fb_listings".to_string(),
            fb_listing_history_table: String::new(),
            city_zip_table: "city_zip".to_string(),
            geocode_fallback: false,
            geocode_rate_limit_seconds: 1.0,
            lot_rent_table: String::new(),
            lot_rent_zip_column: "zip".to_string(),
            lot_rent_county_column: "county_id".to_string(),
            lot_rent_region_column: "region_id".to_string(),
            lot_rent_value_column: "monthly_rent".to_string(),
            output_format: OutputFormat::Full,
        }
    }
}

/// SQL identifiers are interpolated into query text, so they must match
/// the allow-list before any query is built. Bound values never go
/// through this path; they are always parameter-bound.
pub fn valid_ident(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl CompareConfig {
    /// Startup validation. Only checks identifiers a currently enabled
    /// feature actually needs; a disabled feature's blank identifiers
    /// are fine. Per-listing runtime failures are handled elsewhere and
    /// never escalate; this is the one place a misconfiguration is fatal.
    pub fn validate(&self) -> Result<(), EngineError> {
        let require = |name: &str, value: &str| -> Result<(), EngineError> {
            if valid_ident(value) {
                Ok(())
            } else {
                Err(EngineError::Config(format!(
                    "{name} must be a non-empty alphanumeric/underscore identifier, got {value:?}"
                )))
            }
        };

        if self.use_sales_comps {
            require("sales_table", &self.sales_table)?;
            require("properties_table", &self.properties_table)?;
            if self.sales_max_rows == 0 {
                return Err(EngineError::Config(
                    "sales_max_rows must be at least 1".to_string(),
                ));
            }
        }
        if !self.zip_county_table.is_empty() {
            require("zip_county_table", &self.zip_county_table)?;
        }
        if !self.counties_table.is_empty() {
            require("counties_table", &self.counties_table)?;
        }
        if !self.city_zip_table.is_empty() {
            require("city_zip_table", &self.city_zip_table)?;
        }
        if !self.comparison_table.is_empty() {
            require("comparison_table", &self.comparison_table)?;
            require("title_column", &self.title_column)?;
            if let Some(price_col) = &self.price_column {
                require("price_column", price_col)?;
            }
            if self.max_rows == 0 {
                return Err(EngineError::Config("max_rows must be at least 1".to_string()));
            }
        }
        if self.insert_into_fb {
            require("fb_listings_table", &self.fb_listings_table)?;
            if !self.fb_listing_history_table.is_empty() {
                require("fb_listing_history_table", &self.fb_listing_history_table)?;
            }
        }
        if !self.lot_rent_table.is_empty() {
            require("lot_rent_table", &self.lot_rent_table)?;
            require("lot_rent_zip_column", &self.lot_rent_zip_column)?;
            require("lot_rent_county_column", &self.lot_rent_county_column)?;
            require("lot_rent_region_column", &self.lot_rent_region_column)?;
            require("lot_rent_value_column", &self.lot_rent_value_column)?;
        }
        if self.geocode_rate_limit_seconds < 0.0 {
            return Err(EngineError::Config(
                "geocode_rate_limit_seconds must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
