use std::sync::Arc;

use bronzedraw_db::store::MappingStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable. Holds no per-request data and no cached records.
#[derive(Clone)]
pub struct AppState {
    /// Record store used by the lookup and readiness handlers.
    pub store: Arc<dyn MappingStore>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
