use axum::routing::get;
use axum::Router;

use crate::handlers::convert;
use crate::state::AppState;

/// Routes mounted under `/api`.
pub fn router() -> Router<AppState> {
    Router::new().route("/convert", get(convert::convert))
}
