//! JAN-URL conversion API library.
//!
//! Exposes the building blocks (config, connection resolution, state,
//! error handling, routes) so the binaries and integration tests share
//! one router.

pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod router;
pub mod routes;
pub mod state;
pub mod telemetry;
