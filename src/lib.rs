pub mod config;
pub mod db;
pub mod domain;
pub mod enrich;
pub mod errors;
pub mod extract;
pub mod geo;

#[cfg(test)]
mod tests;

pub use config::{CompareConfig, OutputFormat};
pub use db::comps::ComparablesEngine;
pub use db::executor::{Row, SqlExecutor, SqliteExecutor};
pub use db::writer::PersistenceWriter;
pub use domain::context::{CompScope, ComparableListing, ComparableSale, ComparisonContext};
pub use domain::geo::{GeoIdentity, ResolutionSource};
pub use domain::listing::{ExtractedAttributes, Listing};
pub use enrich::{EnrichedListing, ListingEnricher};
pub use errors::EngineError;
pub use geo::cache::{CacheLookup, CacheStore, SqliteCache};
pub use geo::geocode::{Geocoder, NominatimGeocoder};
pub use geo::rate_limit::RateGate;
pub use geo::resolver::GeoResolver;
