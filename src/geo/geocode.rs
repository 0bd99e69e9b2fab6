// src/geo/geocode.rs

use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;
use url::Url;

use crate::errors::EngineError;

const USER_AGENT: &str = concat!("listing_comps/", env!("CARGO_PKG_VERSION"));
const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org/";

/// City/state -> zip lookup against a remote service. `Ok(None)` means
/// the service answered but found nothing; transport and payload
/// failures are errors, which the resolver downgrades to not-found.
pub trait Geocoder: Send + Sync {
    fn lookup_zip(&self, city: &str, state: &str) -> Result<Option<String>, EngineError>;
}

/// Nominatim (OpenStreetMap) search client. One structured query,
/// first result's postcode wins.
pub struct NominatimGeocoder {
    client: Client,
    search_url: Url,
}

impl NominatimGeocoder {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, EngineError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Geocode(e.to_string()))?;
        let search_url = Url::parse(base_url)
            .and_then(|u| u.join("search"))
            .map_err(|e| EngineError::Geocode(format!("Bad geocoder base URL: {e}")))?;
        Ok(Self { client, search_url })
    }
}

impl Geocoder for NominatimGeocoder {
    fn lookup_zip(&self, city: &str, state: &str) -> Result<Option<String>, EngineError> {
        let resp = self
            .client
            .get(self.search_url.clone())
            .query(&[
                ("city", city),
                ("state", state),
                ("country", "us"),
                ("format", "jsonv2"),
                ("addressdetails", "1"),
                ("limit", "1"),
            ])
            .send()
            .map_err(|e| EngineError::Geocode(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::Geocode(format!(
                "Geocoder HTTP {status} for {city}, {state}"
            )));
        }

        let body: Value = resp
            .json()
            .map_err(|e| EngineError::Geocode(format!("Geocoder payload: {e}")))?;
        let results = body
            .as_array()
            .ok_or_else(|| EngineError::Geocode("Geocoder payload: not an array".to_string()))?;

        let postcode = results
            .first()
            .and_then(|r| r["address"]["postcode"].as_str())
            .map(zip_prefix);
        Ok(postcode.flatten())
    }
}

/// Postcodes can come back as zip+4 ("16428-1234"); keep the 5-digit
/// prefix, reject anything that is not one.
fn zip_prefix(postcode: &str) -> Option<String> {
    let head: String = postcode.chars().take(5).collect();
    if head.len() == 5 && head.chars().all(|c| c.is_ascii_digit()) {
        Some(head)
    } else {
        None
    }
}
