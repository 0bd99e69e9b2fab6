// src/domain/geo.rs

/// Which tier of the fallback chain produced the zip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// 5-digit zip found verbatim in the listing text.
    ExplicitText,
    /// city/state matched a row in the local city_zip table.
    LocalLookup,
    /// Remote geocoding API (or its persistent cache).
    RemoteGeocode,
    Unresolved,
}

/// Resolved geographic identity for one listing.
///
/// Invariants: `county_id` is only ever derived from `zip` via the
/// zip_county table, and `region_id` only from that county. An
/// `Unresolved` identity carries no geographic fields at all.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoIdentity {
    pub zip: Option<String>,
    pub county_id: Option<i64>,
    pub region_id: Option<i64>,
    pub source: ResolutionSource,
}

impl GeoIdentity {
    pub fn unresolved() -> Self {
        Self {
            zip: None,
            county_id: None,
            region_id: None,
            source: ResolutionSource::Unresolved,
        }
    }
}
