pub mod cache;
pub mod geocode;
pub mod rate_limit;
pub mod resolver;
