//! Row structs and write DTOs.

pub mod jan_url_mapping;
