// errors.rs
use std::fmt;

/// Errors originating from configuration validation
/// or downstream layers (DB, geocoding, cache).
#[derive(Debug)]
pub enum EngineError {
    Config(String),
    DbError(String),
    Geocode(String),
    Cache(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Config(msg) => write!(f, "Config error: {msg}"),
            EngineError::DbError(msg) => write!(f, "Database error: {msg}"),
            EngineError::Geocode(msg) => write!(f, "Geocode error: {msg}"),
            EngineError::Cache(msg) => write!(f, "Cache error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
