use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Idempotent; also used by tests against
/// in-memory databases.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Knowledge documents with their embedding vectors
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            embedding BLOB NOT NULL,
            access_level TEXT NOT NULL DEFAULT 'private'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Sales transactions, each owned by a product document
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sales (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 1,
            price_total REAL NOT NULL DEFAULT 0,
            sale_date INTEGER NOT NULL,
            category TEXT NOT NULL,
            region TEXT NOT NULL,
            customer_type TEXT NOT NULL,
            customer_name TEXT NOT NULL,
            seller_name TEXT NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Unprocessed ingested payloads awaiting classification
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_records (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_name ON documents(name)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_access ON documents(access_level)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sales_document_id ON sales(document_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sales_customer_name ON sales(customer_name)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sales_sale_date ON sales(sale_date DESC)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_raw_records_created_at ON raw_records(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}
