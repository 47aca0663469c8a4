//! Read-side seam between the HTTP layer and the record store.

use async_trait::async_trait;

use crate::models::jan_url_mapping::JanUrlMapping;
use crate::repositories::JanUrlMappingRepo;
use crate::DbPool;

/// Everything the lookup service needs from the store.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Return the record whose code equals `jan_code`, if any.
    async fn find_by_jan_code(&self, jan_code: &str)
        -> Result<Option<JanUrlMapping>, sqlx::Error>;

    /// Cheap connectivity check used by the readiness probe.
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// PostgreSQL-backed [`MappingStore`].
///
/// Every call checks a connection out of the pool for its own duration.
/// The `PoolConnection` guard hands it back when dropped, on success and
/// on error alike.
#[derive(Clone)]
pub struct PgMappingStore {
    pool: DbPool,
}

impl PgMappingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MappingStore for PgMappingStore {
    async fn find_by_jan_code(
        &self,
        jan_code: &str,
    ) -> Result<Option<JanUrlMapping>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        JanUrlMappingRepo::find_by_jan_code(&mut conn, jan_code).await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        crate::health_check(&self.pool).await
    }
}
