pub mod comps;
pub mod executor;
pub mod writer;
