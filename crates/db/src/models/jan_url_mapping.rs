use bronzedraw_core::error::CoreError;
use bronzedraw_core::jan::validate_jan_code;
use bronzedraw_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Column length limits, mirrored from the migration.
pub const BRAND_MAX_LEN: usize = 100;
pub const PRODUCT_NAME_MAX_LEN: usize = 255;

/// A row from the `jan_url_mapping` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct JanUrlMapping {
    pub id: DbId,
    pub jan_code: String,
    pub url: String,
    pub brand: Option<String>,
    pub product_name: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Insert-or-update DTO used by the seed tool.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJanUrlMapping {
    pub jan_code: String,
    pub url: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
}

impl NewJanUrlMapping {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_jan_code(&self.jan_code)?;

        if self.url.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "url for JAN code '{}' must not be empty",
                self.jan_code
            )));
        }
        check_len("brand", self.brand.as_deref(), BRAND_MAX_LEN)?;
        check_len(
            "product_name",
            self.product_name.as_deref(),
            PRODUCT_NAME_MAX_LEN,
        )?;
        Ok(())
    }
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<(), CoreError> {
    match value {
        Some(v) if v.chars().count() > max => Err(CoreError::Validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}
