//! Handler for JAN code to URL conversion.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use bronzedraw_core::error::CoreError;
use bronzedraw_db::models::jan_url_mapping::JanUrlMapping;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Query parameters for `GET /api/convert`.
#[derive(Debug, Deserialize)]
pub struct ConvertParams {
    /// The code to look up. Its format is not checked here.
    pub jan: String,
}

/// Public view of a mapping record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResponse {
    pub jan_code: String,
    pub url: String,
    pub brand: Option<String>,
    pub product_name: Option<String>,
}

impl From<JanUrlMapping> for ConversionResponse {
    fn from(mapping: JanUrlMapping) -> Self {
        Self {
            jan_code: mapping.jan_code,
            url: mapping.url,
            brand: mapping.brand,
            product_name: mapping.product_name,
        }
    }
}

/// GET /api/convert?jan={code}
pub async fn convert(
    State(state): State<AppState>,
    params: Result<Query<ConvertParams>, QueryRejection>,
) -> AppResult<Json<ConversionResponse>> {
    let Query(ConvertParams { jan }) =
        params.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let mapping = state
        .store
        .find_by_jan_code(&jan)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "JAN code",
                key: jan.clone(),
            })
        })?;

    tracing::debug!(jan_code = %mapping.jan_code, "JAN code resolved");
    Ok(Json(mapping.into()))
}
