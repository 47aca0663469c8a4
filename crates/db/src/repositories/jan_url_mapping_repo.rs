//! Repository for the `jan_url_mapping` table.

use sqlx::PgConnection;

use crate::models::jan_url_mapping::{JanUrlMapping, NewJanUrlMapping};

const COLUMNS: &str = "id, jan_code, url, brand, product_name, created_at, updated_at";

pub struct JanUrlMappingRepo;

impl JanUrlMappingRepo {
    /// Exact-match lookup on the unique `jan_code` column.
    pub async fn find_by_jan_code(
        conn: &mut PgConnection,
        jan_code: &str,
    ) -> Result<Option<JanUrlMapping>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jan_url_mapping WHERE jan_code = $1");
        sqlx::query_as::<_, JanUrlMapping>(&query)
            .bind(jan_code)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Insert a mapping, or refresh url/brand/product_name of the existing
    /// row with the same code. The code itself is never rewritten.
    pub async fn upsert(
        conn: &mut PgConnection,
        input: &NewJanUrlMapping,
    ) -> Result<JanUrlMapping, sqlx::Error> {
        let query = format!(
            "INSERT INTO jan_url_mapping (jan_code, url, brand, product_name) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT uq_jan_url_mapping_jan_code DO UPDATE SET \
                url = EXCLUDED.url, \
                brand = EXCLUDED.brand, \
                product_name = EXCLUDED.product_name \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JanUrlMapping>(&query)
            .bind(&input.jan_code)
            .bind(&input.url)
            .bind(&input.brand)
            .bind(&input.product_name)
            .fetch_one(&mut *conn)
            .await
    }
}
