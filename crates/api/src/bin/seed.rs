//! Load JAN-URL mappings from a JSON file into the record store.
//!
//! ```text
//! bronzedraw-seed db/seeds/jan_url_mapping.json
//! ```
//!
//! The file holds an array of `{jan_code, url, brand?, product_name?}`.
//! Every record is validated before anything is written; the upserts run
//! in one transaction.

use std::time::Duration;

use anyhow::Context;
use bronzedraw_api::{config, connection, telemetry};
use bronzedraw_db::models::jan_url_mapping::NewJanUrlMapping;
use bronzedraw_db::repositories::JanUrlMappingRepo;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing(false);

    let path = std::env::args()
        .nth(1)
        .context("usage: bronzedraw-seed <mappings.json>")?;

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {path}"))?;
    let records = parse_records(&raw, &path)?;

    let resolvers = connection::default_resolvers().await?;
    let options = connection::resolve_connect_options(&resolvers).await?;
    let pool = bronzedraw_db::create_pool(
        options,
        1,
        Duration::from_secs(config::DEFAULT_ACQUIRE_TIMEOUT_SECS),
    );

    let mut tx = pool.begin().await.context("Failed to open transaction")?;
    for record in &records {
        let row = JanUrlMappingRepo::upsert(&mut tx, record)
            .await
            .with_context(|| format!("Failed to upsert {}", record.jan_code))?;
        tracing::debug!(id = row.id, jan_code = %row.jan_code, "Upserted mapping");
    }
    tx.commit().await.context("Failed to commit")?;

    tracing::info!(count = records.len(), path = %path, "Seeded JAN-URL mappings");
    Ok(())
}

/// Parse the mapping array and validate every record. One bad record
/// rejects the whole file.
fn parse_records(raw: &str, path: &str) -> anyhow::Result<Vec<NewJanUrlMapping>> {
    let records: Vec<NewJanUrlMapping> =
        serde_json::from_str(raw).with_context(|| format!("{path} is not a mapping array"))?;

    for (index, record) in records.iter().enumerate() {
        record
            .validate()
            .with_context(|| format!("record #{index} ({})", record.jan_code))?;
    }
    Ok(records)
}
