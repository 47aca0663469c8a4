//! Integration tests for the `jan_url_mapping` table and repository.
//!
//! These need a live PostgreSQL reachable through `DATABASE_URL`; run them
//! with `cargo test -p bronzedraw-db -- --ignored`.

use assert_matches::assert_matches;
use bronzedraw_db::models::jan_url_mapping::NewJanUrlMapping;
use bronzedraw_db::repositories::JanUrlMappingRepo;
use bronzedraw_db::store::{MappingStore, PgMappingStore};
use sqlx::PgPool;

fn jacket() -> NewJanUrlMapping {
    NewJanUrlMapping {
        jan_code: "4571657070839".into(),
        url: "https://example.com/a".into(),
        brand: Some("X".into()),
        product_name: Some("Jacket".into()),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn find_returns_the_stored_record_unchanged(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let inserted = JanUrlMappingRepo::upsert(&mut conn, &jacket()).await.unwrap();

    let found = JanUrlMappingRepo::find_by_jan_code(&mut conn, "4571657070839")
        .await
        .unwrap()
        .expect("record should exist");

    assert_eq!(found, inserted);
    assert_eq!(found.url, "https://example.com/a");
    assert_eq!(found.brand.as_deref(), Some("X"));
    assert_eq!(found.product_name.as_deref(), Some("Jacket"));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn find_misses_on_absent_or_partial_code(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    JanUrlMappingRepo::upsert(&mut conn, &jacket()).await.unwrap();

    for code in ["0000000000000", "457165707083", "4571657070839 "] {
        let found = JanUrlMappingRepo::find_by_jan_code(&mut conn, code)
            .await
            .unwrap();
        assert!(found.is_none(), "{code:?} must not match");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn upsert_keeps_one_row_per_code_and_refreshes_updated_at(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let first = JanUrlMappingRepo::upsert(&mut conn, &jacket()).await.unwrap();

    let changed = NewJanUrlMapping {
        url: "https://example.com/b".into(),
        brand: None,
        ..jacket()
    };
    let second = JanUrlMappingRepo::upsert(&mut conn, &changed).await.unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.url, "https://example.com/b");
    assert_eq!(second.brand, None);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jan_url_mapping")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn empty_url_violates_check_constraint(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let input = NewJanUrlMapping {
        url: String::new(),
        ..jacket()
    };

    let err = JanUrlMappingRepo::upsert(&mut conn, &input).await.unwrap_err();
    assert_matches!(err, sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23514"));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn jan_code_cannot_be_reassigned(pool: PgPool) {
    let mut conn = pool.acquire().await.unwrap();
    let row = JanUrlMappingRepo::upsert(&mut conn, &jacket()).await.unwrap();

    let result = sqlx::query("UPDATE jan_url_mapping SET jan_code = $1 WHERE id = $2")
        .bind("0000000000000")
        .bind(row.id)
        .execute(&pool)
        .await;

    assert!(result.is_err(), "changing jan_code must be rejected");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires DATABASE_URL"]
async fn pg_store_answers_ping_and_lookup(pool: PgPool) {
    {
        let mut conn = pool.acquire().await.unwrap();
        JanUrlMappingRepo::upsert(&mut conn, &jacket()).await.unwrap();
    }
    let store = PgMappingStore::new(pool);

    store.ping().await.unwrap();
    let found = store.find_by_jan_code("4571657070839").await.unwrap();
    assert_eq!(found.map(|m| m.url).as_deref(), Some("https://example.com/a"));
    assert!(store.find_by_jan_code("0000000000000").await.unwrap().is_none());
}
