//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Methods take a checked-out `&mut PgConnection`, so the caller decides
//! how long the connection is held.

pub mod jan_url_mapping_repo;

pub use jan_url_mapping_repo::JanUrlMappingRepo;
