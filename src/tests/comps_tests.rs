use rusqlite::types::Value;
use std::sync::Arc;

use crate::config::{CompareConfig, OutputFormat};
use crate::db::comps::ComparablesEngine;
use crate::db::executor::SqliteExecutor;
use crate::domain::context::CompScope;
use crate::domain::geo::{GeoIdentity, ResolutionSource};
use crate::domain::listing::ExtractedAttributes;
use crate::tests::support::{exec, make_db, make_listing};

fn make_engine(db: Arc<SqliteExecutor>, config: CompareConfig) -> ComparablesEngine {
    ComparablesEngine::new(db, Arc::new(config))
}

fn sales_config() -> CompareConfig {
    let mut config = CompareConfig::default();
    config.use_sales_comps = true;
    config
}

fn geo_zip_county(zip: &str, county_id: i64, region_id: Option<i64>) -> GeoIdentity {
    GeoIdentity {
        zip: Some(zip.to_string()),
        county_id: Some(county_id),
        region_id,
        source: ResolutionSource::ExplicitText,
    }
}

fn seed_property(
    db: &Arc<SqliteExecutor>,
    id: i64,
    beds: i64,
    baths: f64,
    year_built: i64,
    zip: &str,
    county_id: i64,
    region_id: i64,
) {
    exec(
        db,
        "INSERT INTO properties (id, beds, baths, square_feet, year_built, city, state, zip, county_id, region_id)
         VALUES (?1, ?2, ?3, 1200, ?4, 'Houston', 'TX', ?5, ?6, ?7)",
        &[
            Value::Integer(id),
            Value::Integer(beds),
            Value::Real(baths),
            Value::Integer(year_built),
            Value::Text(zip.to_string()),
            Value::Integer(county_id),
            Value::Integer(region_id),
        ],
    );
}

fn seed_sale(db: &Arc<SqliteExecutor>, property_id: i64, price: f64, date: &str) {
    exec(
        db,
        "INSERT INTO sales (property_id, sale_price, sale_date) VALUES (?1, ?2, ?3)",
        &[
            Value::Integer(property_id),
            Value::Real(price),
            Value::Text(date.to_string()),
        ],
    );
}

fn seed_fb_listing(db: &Arc<SqliteExecutor>, id: &str, title: &str, price: f64) {
    exec(
        db,
        "INSERT INTO fb_listings (external_id, title, asking_price) VALUES (?1, ?2, ?3)",
        &[
            Value::Text(id.to_string()),
            Value::Text(title.to_string()),
            Value::Real(price),
        ],
    );
}

#[test]
fn sales_comps_stop_at_first_non_empty_scope() {
    let db = make_db();
    // One hit at zip scope even though county scope has more rows.
    seed_property(&db, 1, 3, 2.0, 1995, "77001", 1, 2);
    seed_property(&db, 2, 3, 2.0, 1995, "88888", 1, 2);
    seed_property(&db, 3, 3, 2.0, 1995, "88888", 1, 2);
    seed_sale(&db, 1, 250000.0, "2024-01-15");
    seed_sale(&db, 2, 260000.0, "2024-02-15");
    seed_sale(&db, 3, 270000.0, "2024-03-15");

    let engine = make_engine(db, sales_config());
    let listing = make_listing("3 bed 2 bath", "", "Houston, TX 77001", Some(300000.0));
    let attrs = ExtractedAttributes::default();
    let context = engine.build_context(&listing, &attrs, &geo_zip_county("77001", 1, Some(2)));

    // Zip rows only; county rows are never blended in.
    assert_eq!(context.sales_scope, Some(CompScope::Zip));
    assert_eq!(context.sales.len(), 1);
    assert_eq!(context.sales[0].zip.as_deref(), Some("77001"));
}

#[test]
fn sales_comps_widen_to_county_when_zip_is_empty() {
    let db = make_db();
    seed_property(&db, 1, 3, 2.0, 1995, "88888", 1, 2);
    seed_property(&db, 2, 3, 2.0, 1995, "88888", 1, 2);
    seed_sale(&db, 1, 250000.0, "2024-01-15");
    seed_sale(&db, 2, 260000.0, "2024-02-15");

    let engine = make_engine(db, sales_config());
    let listing = make_listing("3 bed 2 bath", "", "Houston, TX 77001", Some(300000.0));
    let context = engine.build_context(
        &listing,
        &ExtractedAttributes::default(),
        &geo_zip_county("77001", 1, Some(2)),
    );

    assert_eq!(context.sales_scope, Some(CompScope::County));
    assert_eq!(context.sales.len(), 2);
}

#[test]
fn sales_comps_exhausted_hierarchy_reports_no_scope() {
    let db = make_db();
    let engine = make_engine(db, sales_config());
    let listing = make_listing("3 bed", "", "Houston, TX 77001", None);
    let context = engine.build_context(
        &listing,
        &ExtractedAttributes::default(),
        &geo_zip_county("77001", 1, Some(2)),
    );

    assert_eq!(context.sales_scope, None);
    assert!(context.sales.is_empty());
}

#[test]
fn attribute_filters_apply_only_when_known() {
    let db = make_db();
    seed_property(&db, 1, 3, 2.0, 1995, "77001", 1, 2);
    seed_property(&db, 2, 4, 2.0, 1995, "77001", 1, 2);
    seed_sale(&db, 1, 250000.0, "2024-01-15");
    seed_sale(&db, 2, 260000.0, "2024-02-15");

    let engine = make_engine(Arc::clone(&db), sales_config());
    let listing = make_listing("house", "", "Houston, TX 77001", None);
    let geo = geo_zip_county("77001", 1, Some(2));

    // beds known: only the 3-bed property matches.
    let attrs = ExtractedAttributes {
        beds: Some(3),
        baths: None,
        year_built: None,
    };
    let context = engine.build_context(&listing, &attrs, &geo);
    assert_eq!(context.sales.len(), 1);
    assert_eq!(context.sales[0].beds, Some(3));

    // beds unknown: the filter is absent, both match.
    let context = engine.build_context(&listing, &ExtractedAttributes::default(), &geo);
    assert_eq!(context.sales.len(), 2);
}

#[test]
fn year_filter_is_inclusive_of_tolerance_bounds() {
    let db = make_db();
    seed_property(&db, 1, 3, 2.0, 1990, "77001", 1, 2); // at lower bound
    seed_property(&db, 2, 3, 2.0, 1989, "77001", 1, 2); // outside
    seed_sale(&db, 1, 250000.0, "2024-01-15");
    seed_sale(&db, 2, 260000.0, "2024-02-15");

    let engine = make_engine(db, sales_config());
    let listing = make_listing("house", "", "Houston, TX 77001", None);
    let attrs = ExtractedAttributes {
        beds: None,
        baths: None,
        year_built: Some(1995),
    };
    let context = engine.build_context(&listing, &attrs, &geo_zip_county("77001", 1, Some(2)));

    assert_eq!(context.sales.len(), 1);
    assert_eq!(context.sales[0].year_built, Some(1990));
}

#[test]
fn sales_rows_are_capped_and_ordered_by_recency() {
    let db = make_db();
    for id in 1..=3 {
        seed_property(&db, id, 3, 2.0, 1995, "77001", 1, 2);
    }
    seed_sale(&db, 1, 250000.0, "2024-01-15");
    seed_sale(&db, 2, 260000.0, "2024-03-15");
    seed_sale(&db, 3, 270000.0, "2024-02-15");

    let mut config = sales_config();
    config.sales_max_rows = 2;
    let engine = make_engine(db, config);
    let listing = make_listing("house", "", "Houston, TX 77001", None);
    let context = engine.build_context(
        &listing,
        &ExtractedAttributes::default(),
        &geo_zip_county("77001", 1, Some(2)),
    );

    assert_eq!(context.sales.len(), 2);
    assert_eq!(context.sales[0].sale_date.as_deref(), Some("2024-03-15"));
    assert_eq!(context.sales[1].sale_date.as_deref(), Some("2024-02-15"));
}

fn fb_config() -> CompareConfig {
    let mut config = CompareConfig::default();
    config.comparison_table = "fb_listings".to_string();
    config.title_column = "title".to_string();
    config.price_column = Some("asking_price".to_string());
    config
}

#[test]
fn builtin_comparison_filters_title_and_price_ceiling() {
    let db = make_db();
    seed_fb_listing(&db, "a", "Mobile home 3 bed", 450000.0); // at 1.5x, included
    seed_fb_listing(&db, "b", "Mobile home 2 bed", 460000.0); // above ceiling
    seed_fb_listing(&db, "c", "Pontoon boat", 10000.0); // title mismatch

    let engine = make_engine(db, fb_config());
    let listing = make_listing("Mobile home", "", "Freedom, PA", Some(300000.0));
    let context =
        engine.build_context(&listing, &ExtractedAttributes::default(), &GeoIdentity::unresolved());

    assert_eq!(context.listings.len(), 1);
    assert_eq!(context.listings[0].title.as_deref(), Some("Mobile home 3 bed"));
    assert_eq!(context.listings[0].price, Some(450000.0));
}

#[test]
fn builtin_comparison_skips_price_filter_without_a_price() {
    let db = make_db();
    seed_fb_listing(&db, "a", "Mobile home 3 bed", 450000.0);
    seed_fb_listing(&db, "b", "Mobile home 2 bed", 460000.0);

    let engine = make_engine(db, fb_config());
    let listing = make_listing("Mobile home", "", "Freedom, PA", None);
    let context =
        engine.build_context(&listing, &ExtractedAttributes::default(), &GeoIdentity::unresolved());

    assert_eq!(context.listings.len(), 2);
}

#[test]
fn builtin_comparison_runs_even_when_sales_comps_find_nothing() {
    let db = make_db();
    seed_fb_listing(&db, "a", "Mobile home 3 bed", 100000.0);

    let mut config = fb_config();
    config.use_sales_comps = true;
    let engine = make_engine(db, config);
    let listing = make_listing("Mobile home", "", "Freedom, PA 16428", Some(100000.0));
    let context = engine.build_context(
        &listing,
        &ExtractedAttributes::default(),
        &geo_zip_county("16428", 1, None),
    );

    assert_eq!(context.sales_scope, None);
    assert_eq!(context.listings.len(), 1);
}

#[test]
fn custom_query_replaces_builtin_comparison() {
    let db = make_db();
    // This row fails the builtin title LIKE; the custom query still finds it.
    seed_fb_listing(&db, "a", "Completely different", 200000.0);

    let mut config = fb_config();
    config.comparison_query =
        "SELECT * FROM fb_listings WHERE asking_price <= {price}".to_string();
    let engine = make_engine(db, config);
    let listing = make_listing("Mobile home", "", "Freedom, PA", Some(250000.0));
    let context =
        engine.build_context(&listing, &ExtractedAttributes::default(), &GeoIdentity::unresolved());

    assert_eq!(context.listings.len(), 1);
    assert_eq!(
        context.listings[0].title.as_deref(),
        Some("Completely different")
    );
}

#[test]
fn failed_comparison_query_degrades_to_empty() {
    let db = make_db();
    seed_property(&db, 1, 3, 2.0, 1995, "77001", 1, 2);
    seed_sale(&db, 1, 250000.0, "2024-01-15");

    let mut config = sales_config();
    // Passes identifier validation but the table does not exist.
    config.comparison_table = "no_such_table".to_string();
    let engine = make_engine(db, config);
    let listing = make_listing("house", "", "Houston, TX 77001", Some(300000.0));
    let context = engine.build_context(
        &listing,
        &ExtractedAttributes::default(),
        &geo_zip_county("77001", 1, Some(2)),
    );

    // The sales sub-result still came through.
    assert_eq!(context.sales_scope, Some(CompScope::Zip));
    assert!(context.listings.is_empty());
}

fn lot_rent_config() -> CompareConfig {
    let mut config = CompareConfig::default();
    config.lot_rent_table = "lot_rents".to_string();
    config
}

fn seed_lot_rent(db: &Arc<SqliteExecutor>, zip: Option<&str>, county_id: Option<i64>, rent: f64) {
    exec(
        db,
        "INSERT INTO lot_rents (zip, county_id, monthly_rent) VALUES (?1, ?2, ?3)",
        &[
            zip.map(|z| Value::Text(z.to_string())).unwrap_or(Value::Null),
            county_id.map(Value::Integer).unwrap_or(Value::Null),
            Value::Real(rent),
        ],
    );
}

#[test]
fn lot_rent_note_averages_at_zip_scope() {
    let db = make_db();
    seed_lot_rent(&db, Some("77001"), None, 400.0);
    seed_lot_rent(&db, Some("77001"), None, 450.0);

    let engine = make_engine(db, lot_rent_config());
    let listing = make_listing("Mobile home", "", "Houston, TX 77001", None);
    let context = engine.build_context(
        &listing,
        &ExtractedAttributes::default(),
        &geo_zip_county("77001", 1, None),
    );

    assert_eq!(context.note.as_deref(), Some("Average lot rent (zip): $425/mo"));
}

#[test]
fn lot_rent_note_widens_to_county() {
    let db = make_db();
    seed_lot_rent(&db, Some("88888"), Some(1), 500.0);

    let engine = make_engine(db, lot_rent_config());
    let listing = make_listing("Mobile home", "", "Houston, TX 77001", None);
    let context = engine.build_context(
        &listing,
        &ExtractedAttributes::default(),
        &geo_zip_county("77001", 1, None),
    );

    assert_eq!(
        context.note.as_deref(),
        Some("Average lot rent (county): $500/mo")
    );
}

#[test]
fn lot_rent_note_never_overrides_a_stated_figure() {
    let db = make_db();
    seed_lot_rent(&db, Some("77001"), None, 400.0);

    let engine = make_engine(db, lot_rent_config());
    let listing = make_listing("Mobile home, lot rent $500", "", "Houston, TX 77001", None);
    let context = engine.build_context(
        &listing,
        &ExtractedAttributes::default(),
        &geo_zip_county("77001", 1, None),
    );

    assert_eq!(context.note, None);
}

#[test]
fn summary_respects_output_format() {
    let db = make_db();
    seed_property(&db, 1, 3, 2.0, 1995, "77001", 1, 2);
    seed_sale(&db, 1, 250000.0, "2024-01-15");

    let engine = make_engine(db, sales_config());
    let listing = make_listing("house", "", "Houston, TX 77001", None);
    let context = engine.build_context(
        &listing,
        &ExtractedAttributes::default(),
        &geo_zip_county("77001", 1, Some(2)),
    );

    let full = context.summary(OutputFormat::Full).unwrap();
    assert!(full.starts_with("Recent sold comps (zip):"));
    assert!(full.contains("sold $250000"));

    let short = context.summary(OutputFormat::Short).unwrap();
    assert!(short.chars().count() <= 123);
    assert!(!short.contains('\n'));

    assert_eq!(context.summary(OutputFormat::None), None);
}
