// src/db/comps.rs
//
// Hierarchical sales-comps query (zip -> county -> region) plus the
// independent comparable-listings query, composed into one
// ComparisonContext. Individual query failures degrade that sub-result
// to empty; the context build itself always succeeds.

use rusqlite::types::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{valid_ident, CompareConfig};
use crate::db::executor::{Row, SqlExecutor};
use crate::domain::context::{CompScope, ComparableListing, ComparableSale, ComparisonContext};
use crate::domain::geo::GeoIdentity;
use crate::domain::listing::{ExtractedAttributes, Listing};
use crate::extract;

/// Price ceiling for the built-in comparison: asking price times this.
const PRICE_CEILING_MULTIPLIER: f64 = 1.5;
/// How much of the listing title feeds the LIKE pattern.
const TITLE_LIKE_CHARS: usize = 30;

pub struct ComparablesEngine {
    db: Arc<dyn SqlExecutor>,
    config: Arc<CompareConfig>,
    /// Fills the {item_name} placeholder of a custom comparison query.
    item_name: String,
}

impl ComparablesEngine {
    pub fn new(db: Arc<dyn SqlExecutor>, config: Arc<CompareConfig>) -> Self {
        Self {
            db,
            config,
            item_name: String::new(),
        }
    }

    /// Name of the monitored item this listing was matched against.
    pub fn with_item_name(mut self, item_name: impl Into<String>) -> Self {
        self.item_name = item_name.into();
        self
    }

    /// Compose the comparison context for one listing. Never fails;
    /// each sub-query degrades to empty on error so the evaluator can
    /// still proceed with partial information.
    pub fn build_context(
        &self,
        listing: &Listing,
        attrs: &ExtractedAttributes,
        geo: &GeoIdentity,
    ) -> ComparisonContext {
        let mut context = ComparisonContext::empty();

        if self.config.use_sales_comps {
            let (sales, scope) = self.fetch_sales_comps(attrs, geo);
            context.sales = sales;
            context.sales_scope = scope;
        }

        context.listings = if !self.config.comparison_query.is_empty() {
            self.run_custom_query(listing)
        } else if !self.config.comparison_table.is_empty() {
            self.run_builtin_comparison(listing)
        } else {
            Vec::new()
        };

        context.note = self.lot_rent_note(&listing.full_text(), geo);

        context
    }

    /// Widen zip -> county -> region, stopping at the first scope with
    /// at least one row. Rows from different scopes are never blended.
    fn fetch_sales_comps(
        &self,
        attrs: &ExtractedAttributes,
        geo: &GeoIdentity,
    ) -> (Vec<ComparableSale>, Option<CompScope>) {
        let s_t = &self.config.sales_table;
        let p_t = &self.config.properties_table;
        if !valid_ident(s_t) || !valid_ident(p_t) {
            return (Vec::new(), None);
        }

        // Attribute filters are absent from the predicate entirely when
        // the attribute is unknown, not relaxed to match-anything.
        let mut conditions: Vec<&str> = Vec::new();
        let mut attr_params: Vec<Value> = Vec::new();
        if let Some(beds) = attrs.beds {
            conditions.push("p.beds = ?");
            attr_params.push(Value::Integer(beds));
        }
        if let Some(baths) = attrs.baths {
            conditions.push("p.baths = ?");
            attr_params.push(Value::Real(baths));
        }
        if let Some(year) = attrs.year_built {
            if self.config.year_tolerance >= 0 {
                conditions.push("p.year_built BETWEEN ? AND ?");
                attr_params.push(Value::Integer(year - self.config.year_tolerance));
                attr_params.push(Value::Integer(year + self.config.year_tolerance));
            }
        }
        let where_extra = if conditions.is_empty() {
            String::new()
        } else {
            format!(" AND {}", conditions.join(" AND "))
        };

        let mut scopes: Vec<(CompScope, &str, Value)> = Vec::new();
        if let Some(zip) = &geo.zip {
            scopes.push((CompScope::Zip, "p.zip = ?", Value::Text(zip.clone())));
        }
        if let Some(county_id) = geo.county_id {
            scopes.push((CompScope::County, "p.county_id = ?", Value::Integer(county_id)));
        }
        if let Some(region_id) = geo.region_id {
            scopes.push((CompScope::Region, "p.region_id = ?", Value::Integer(region_id)));
        }
        if scopes.is_empty() {
            debug!("sales comps skipped: no zip/county/region resolved");
            return (Vec::new(), None);
        }

        for (scope, scope_where, scope_param) in scopes {
            let sql = format!(
                "SELECT s.sale_price, s.sale_date, p.beds, p.baths, p.square_feet, \
                 p.year_built, p.city, p.state, p.zip \
                 FROM {s_t} s JOIN {p_t} p ON s.property_id = p.id \
                 WHERE {scope_where}{where_extra} \
                 ORDER BY s.sale_date DESC, s.sale_price DESC LIMIT ?"
            );
            let mut params = vec![scope_param];
            params.extend(attr_params.iter().cloned());
            params.push(Value::Integer(self.config.sales_max_rows as i64));

            match self.db.query(&sql, &params) {
                Ok(rows) => {
                    debug!("sales comps: scope={} -> {} rows", scope.as_str(), rows.len());
                    if !rows.is_empty() {
                        let sales = rows.iter().map(sale_from_row).collect();
                        return (sales, Some(scope));
                    }
                }
                Err(e) => {
                    warn!("sales comps query failed at scope {}: {e}", scope.as_str());
                }
            }
        }

        (Vec::new(), None)
    }

    /// Built-in comparison: titles LIKE the head of the listing title,
    /// price at most 1.5x asking. Runs regardless of the sales-comps
    /// outcome.
    fn run_builtin_comparison(&self, listing: &Listing) -> Vec<ComparableListing> {
        let table = &self.config.comparison_table;
        let title_col = &self.config.title_column;
        if !valid_ident(table) || !valid_ident(title_col) {
            return Vec::new();
        }
        let price_col = self
            .config
            .price_column
            .as_deref()
            .filter(|c| valid_ident(c));

        let head: String = listing.title.chars().take(TITLE_LIKE_CHARS).collect();
        let title_like = format!("%{head}%");
        let limit = Value::Integer(self.config.max_rows as i64);

        let result = match (price_col, listing.price) {
            (Some(price_col), Some(price)) => self.db.query(
                &format!(
                    "SELECT * FROM {table} WHERE {title_col} LIKE ?1 AND {price_col} <= ?2 \
                     ORDER BY {price_col} DESC LIMIT ?3"
                ),
                &[
                    Value::Text(title_like),
                    Value::Real(price * PRICE_CEILING_MULTIPLIER),
                    limit,
                ],
            ),
            _ => self.db.query(
                &format!("SELECT * FROM {table} WHERE {title_col} LIKE ?1 LIMIT ?2"),
                &[Value::Text(title_like), limit],
            ),
        };

        match result {
            Ok(rows) => rows
                .iter()
                .map(|row| self.listing_from_row(row))
                .collect(),
            Err(e) => {
                warn!("builtin comparison query failed on {table}: {e}");
                Vec::new()
            }
        }
    }

    /// The custom-query escape hatch. Replaces the built-in comparison
    /// wholesale; {title}, {price}, {location}, {item_name} placeholders
    /// are substituted before execution.
    fn run_custom_query(&self, listing: &Listing) -> Vec<ComparableListing> {
        let title: String = listing.title.chars().take(200).collect();
        let location: String = listing.location.chars().take(100).collect();
        let price = listing
            .price
            .map(|p| p.to_string())
            .unwrap_or_default();

        let mut sql = self
            .config
            .comparison_query
            .replace("{title}", &escape_sql_text(&title))
            .replace("{price}", &price)
            .replace("{location}", &escape_sql_text(&location))
            .replace("{item_name}", &escape_sql_text(&self.item_name));
        if !sql.to_uppercase().contains("LIMIT") {
            sql = format!(
                "{} LIMIT {}",
                sql.trim_end().trim_end_matches(';'),
                self.config.max_rows
            );
        }

        match self.db.query(&sql, &[]) {
            Ok(rows) => rows
                .iter()
                .take(self.config.max_rows)
                .map(|row| self.listing_from_row(row))
                .collect(),
            Err(e) => {
                warn!("custom comparison query failed: {e}");
                Vec::new()
            }
        }
    }

    fn listing_from_row(&self, row: &Row) -> ComparableListing {
        ComparableListing {
            title: row.get_str(&self.config.title_column),
            price: self
                .config
                .price_column
                .as_deref()
                .and_then(|c| row.get_f64(c)),
            fields: row.display_fields(),
        }
    }

    /// Average-lot-rent annotation, widened zip -> county -> region
    /// independently of the sales comps. Skipped entirely when the
    /// listing already states a rent figure.
    fn lot_rent_note(&self, listing_text: &str, geo: &GeoIdentity) -> Option<String> {
        let table = &self.config.lot_rent_table;
        if table.is_empty() || !valid_ident(table) {
            return None;
        }
        if extract::mentions_rent_figure(listing_text) {
            debug!("lot rent annotation skipped: listing already states a rent figure");
            return None;
        }
        let value_col = &self.config.lot_rent_value_column;
        if !valid_ident(value_col) {
            return None;
        }

        let mut scopes: Vec<(CompScope, &str, Value)> = Vec::new();
        if let Some(zip) = &geo.zip {
            scopes.push((
                CompScope::Zip,
                self.config.lot_rent_zip_column.as_str(),
                Value::Text(zip.clone()),
            ));
        }
        if let Some(county_id) = geo.county_id {
            scopes.push((
                CompScope::County,
                self.config.lot_rent_county_column.as_str(),
                Value::Integer(county_id),
            ));
        }
        if let Some(region_id) = geo.region_id {
            scopes.push((
                CompScope::Region,
                self.config.lot_rent_region_column.as_str(),
                Value::Integer(region_id),
            ));
        }

        for (scope, column, key) in scopes {
            if !valid_ident(column) {
                continue;
            }
            let sql =
                format!("SELECT AVG({value_col}) AS avg_rent FROM {table} WHERE {column} = ?1");
            match self.db.query(&sql, &[key]) {
                Ok(rows) => {
                    if let Some(avg) = rows.first().and_then(|r| r.get_f64("avg_rent")) {
                        return Some(format!(
                            "Average lot rent ({}): ${avg:.0}/mo",
                            scope.as_str()
                        ));
                    }
                }
                Err(e) => {
                    warn!("lot rent lookup failed at scope {}: {e}", scope.as_str());
                }
            }
        }
        None
    }
}

fn sale_from_row(row: &Row) -> ComparableSale {
    ComparableSale {
        sale_price: row.get_f64("sale_price"),
        sale_date: row.get_str("sale_date"),
        beds: row.get_i64("beds"),
        baths: row.get_f64("baths"),
        square_feet: row.get_i64("square_feet"),
        year_built: row.get_i64("year_built"),
        city: row.get_str("city"),
        state: row.get_str("state"),
        zip: row.get_str("zip"),
    }
}

/// Single quotes doubled for values substituted into the custom query
/// template. Built-in queries always use parameter binding instead.
fn escape_sql_text(text: &str) -> String {
    text.replace('\'', "''")
}
