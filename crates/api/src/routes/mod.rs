pub mod convert;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /convert?jan={code}      GET  JAN code -> URL
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(convert::router())
}
