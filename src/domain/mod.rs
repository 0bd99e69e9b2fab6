pub mod context;
pub mod geo;
pub mod listing;
