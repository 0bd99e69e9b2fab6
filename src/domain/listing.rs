// src/domain/listing.rs

use chrono::NaiveDateTime;

/// One marketplace listing as handed to us by the crawler.
/// Read-only input; immutable for the duration of one evaluation cycle.
#[derive(Debug, Clone)]
pub struct Listing {
    /// External identifier from the marketplace (upsert key downstream).
    pub id: String,
    pub title: String,
    pub description: String,
    /// Asking price, already numeric. Raw marketplace strings go through
    /// `extract::parse_price` before landing here.
    pub price: Option<f64>,
    /// Free-text location, e.g. "Houston, TX 77001".
    pub location: String,
    pub posted_at: Option<NaiveDateTime>,
    pub url: String,
}

impl Listing {
    /// Title + description, the haystack for attribute extraction.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

/// Structured attributes parsed out of listing free text.
/// A field is None when no confident match was found; extraction
/// ambiguity is not an error.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtractedAttributes {
    pub beds: Option<i64>,
    /// Half-steps allowed ("2.5 bath").
    pub baths: Option<f64>,
    pub year_built: Option<i64>,
}
