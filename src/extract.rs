// src/extract.rs
//
// Bounded pattern matching over listing free text. Pure functions:
// a failed parse is an absent attribute, never an error.

use chrono::Datelike;
use regex::Regex;
use std::sync::OnceLock;

use crate::domain::listing::ExtractedAttributes;

fn bed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(\d{1,2})\s*(?:bedrooms?|beds?|br)\b").unwrap())
}

fn bath_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2}(?:\.\d+)?½?)\s*(?:bathrooms?|baths?|ba)\b").unwrap()
    })
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").unwrap())
}

fn build_keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bbuilt(?:\s+in)?\b|\bconstructed\b").unwrap())
}

fn zip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{5})(?:-\d{4})?\b").unwrap())
}

fn rent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:lot |space |site )?rent\b\D{0,12}\$?\s*\d").unwrap())
}

/// How far (in bytes) a year token may sit from a construction keyword
/// and still count as a built-year.
const YEAR_KEYWORD_WINDOW: usize = 20;

/// Parse beds, baths, and built-year from listing title + description.
/// First unambiguous match wins for beds/baths; built-year must sit
/// next to a construction keyword.
pub fn extract(title: &str, description: &str) -> ExtractedAttributes {
    let text = format!("{title} {description}");
    ExtractedAttributes {
        beds: extract_beds(&text),
        baths: extract_baths(&text),
        year_built: extract_year_built(&text),
    }
}

fn extract_beds(text: &str) -> Option<i64> {
    let caps = bed_re().captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

fn extract_baths(text: &str) -> Option<f64> {
    let caps = bath_re().captures(text)?;
    let token = caps.get(1)?.as_str();
    if let Some(whole) = token.strip_suffix('½') {
        let base: f64 = whole.parse().ok()?;
        Some(base + 0.5)
    } else {
        token.parse().ok()
    }
}

fn extract_year_built(text: &str) -> Option<i64> {
    let current_year = chrono::Utc::now().year() as i64;
    let keywords: Vec<(usize, usize)> = build_keyword_re()
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();
    if keywords.is_empty() {
        return None;
    }

    let mut best: Option<(usize, i64)> = None;
    for caps in year_re().captures_iter(text) {
        let m = caps.get(1)?;
        let year: i64 = match m.as_str().parse() {
            Ok(y) => y,
            Err(_) => continue,
        };
        if !(1800..=current_year + 1).contains(&year) {
            continue;
        }
        // Distance from the year token to the nearest keyword.
        let dist = keywords
            .iter()
            .map(|&(ks, ke)| {
                if ke <= m.start() {
                    m.start() - ke
                } else if m.end() <= ks {
                    ks - m.end()
                } else {
                    0
                }
            })
            .min()?;
        if dist <= YEAR_KEYWORD_WINDOW && best.map_or(true, |(d, _)| dist < d) {
            best = Some((dist, year));
        }
    }
    best.map(|(_, year)| year)
}

/// Find a 5-digit US zip in free text. Tokens embedded in longer
/// numbers (or decimals) are rejected; zip+4 suffixes are accepted.
pub fn extract_zip(text: &str) -> Option<String> {
    for caps in zip_re().captures_iter(text) {
        let m = caps.get(1)?;
        let before = text[..m.start()].chars().last();
        let after = text[caps.get(0)?.end()..].chars().next();
        let bad = |c: Option<char>| matches!(c, Some(c) if c.is_ascii_digit() || c == '.');
        if bad(before) || bad(after) {
            continue;
        }
        return Some(m.as_str().to_string());
    }
    None
}

/// Numeric price from a raw marketplace price string
/// (e.g. "$180,000" or "€ 200"). Placeholder strings yield None.
pub fn parse_price(price: &str) -> Option<f64> {
    if price.is_empty() || price == "**unspecified**" {
        return None;
    }
    let cleaned: String = price
        .replace(',', "")
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Split a free-text location into (city, state). A trailing 2-letter
/// alphabetic token after a comma is treated as the state abbreviation.
pub fn parse_location(location: &str) -> (Option<String>, Option<String>) {
    let loc = location.trim();
    if loc.is_empty() {
        return (None, None);
    }
    let parts: Vec<&str> = loc
        .split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() >= 2 {
        // The state part may carry a trailing zip ("TX 77001").
        let tail = parts[parts.len() - 1];
        let state_token = tail.split_whitespace().next().unwrap_or("");
        if state_token.len() == 2 && state_token.chars().all(|c| c.is_ascii_alphabetic()) {
            return (
                Some(parts[0].to_string()),
                Some(state_token.to_uppercase()),
            );
        }
        return (Some(parts[0].to_string()), None);
    }
    if extract_zip(loc).is_none() {
        return (Some(loc.to_string()), None);
    }
    (None, None)
}

/// Does the listing already state a rent/space-rent dollar figure?
/// Used to avoid overwriting listing-provided numbers with averages.
pub fn mentions_rent_figure(text: &str) -> bool {
    rent_re().is_match(text)
}
