#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bronzedraw_api::config::ServerConfig;
use bronzedraw_api::router::build_app_router;
use bronzedraw_api::state::AppState;
use bronzedraw_db::models::jan_url_mapping::JanUrlMapping;
use bronzedraw_db::store::MappingStore;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

/// In-memory [`MappingStore`] with a switch to simulate an outage.
#[derive(Default)]
pub struct MemoryStore {
    rows: HashMap<String, JanUrlMapping>,
    offline: AtomicBool,
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn with_rows(rows: impl IntoIterator<Item = JanUrlMapping>) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (r.jan_code.clone(), r)).collect(),
            ..Self::default()
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of store calls made so far (lookups and pings).
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<(), sqlx::Error> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            Err(sqlx::Error::PoolTimedOut)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MappingStore for MemoryStore {
    async fn find_by_jan_code(
        &self,
        jan_code: &str,
    ) -> Result<Option<JanUrlMapping>, sqlx::Error> {
        self.check_online()?;
        Ok(self.rows.get(jan_code).cloned())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        self.check_online()
    }
}

pub fn mapping(
    id: i64,
    jan_code: &str,
    url: &str,
    brand: Option<&str>,
    product_name: Option<&str>,
) -> JanUrlMapping {
    let at = Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap();
    JanUrlMapping {
        id,
        jan_code: jan_code.to_string(),
        url: url.to_string(),
        brand: brand.map(str::to_string),
        product_name: product_name.map(str::to_string),
        created_at: at,
        updated_at: at,
    }
}

/// The record used throughout the lookup scenarios.
pub fn jacket() -> JanUrlMapping {
    mapping(
        1,
        "4571657070839",
        "https://example.com/a",
        Some("X"),
        Some("Jacket"),
    )
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        environment: "test".to_string(),
        db_echo: false,
        db_max_connections: 1,
        db_acquire_timeout_secs: 2,
        run_migrations: false,
    }
}

/// Build the full application router over the given store.
pub fn build_test_app(store: Arc<MemoryStore>) -> Router {
    build_test_app_with_config(store, test_config())
}

pub fn build_test_app_with_config(store: Arc<MemoryStore>, config: ServerConfig) -> Router {
    let state = AppState {
        store: store as Arc<dyn MappingStore>,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
