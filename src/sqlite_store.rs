//! SQLite-backed [`EntityStore`] implementation.
//!
//! Embeddings are stored as little-endian f32 BLOBs and the nearest-neighbor
//! query is a brute-force L2 scan over all candidate rows — no approximate
//! index. The access filter is part of the SQL `WHERE` clause, so rows a
//! caller may not see are excluded before they ever leave the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, l2_distance_sq, vec_to_blob};
use crate::error::{EngineError, Result};
use crate::models::{
    AccessLevel, Document, DocumentUpdate, ProductView, RawRecord, SaleRecord, SaleWithProduct,
    StoreStats,
};
use crate::store::{EntityStore, StagedBatch};

/// SQLite implementation of the [`EntityStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
    let blob: Vec<u8> = row.get("embedding");
    let access: String = row.get("access_level");
    Document {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        embedding: blob_to_vec(&blob),
        access_level: AccessLevel::parse(&access),
    }
}

fn row_to_sale(row: &sqlx::sqlite::SqliteRow) -> SaleRecord {
    let sale_date: i64 = row.get("sale_date");
    SaleRecord {
        id: row.get("id"),
        document_id: row.get("document_id"),
        quantity: row.get("quantity"),
        price_total: row.get("price_total"),
        sale_date: timestamp_to_datetime(sale_date),
        category: row.get("category"),
        region: row.get("region"),
        customer_type: row.get("customer_type"),
        customer_name: row.get("customer_name"),
        seller_name: row.get("seller_name"),
    }
}

async fn insert_document_tx<'e, E>(executor: E, doc: &Document) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO documents (id, name, description, embedding, access_level)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&doc.id)
    .bind(&doc.name)
    .bind(&doc.description)
    .bind(vec_to_blob(&doc.embedding))
    .bind(doc.access_level.as_str())
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn insert_raw_record(&self, record: &RawRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO raw_records (id, source, payload, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.source)
        .bind(record.payload.to_string())
        .bind(record.created_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_raw_records(&self, limit: i64) -> Result<Vec<RawRecord>> {
        let rows = sqlx::query(
            "SELECT id, source, payload, created_at FROM raw_records ORDER BY created_at ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let payload: String = row.get("payload");
                let created_at: i64 = row.get("created_at");
                RawRecord {
                    id: row.get("id"),
                    source: row.get("source"),
                    payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
                    created_at: timestamp_to_datetime(created_at),
                }
            })
            .collect())
    }

    async fn insert_document(&self, doc: &Document) -> Result<()> {
        insert_document_tx(&self.pool, doc).await
    }

    async fn get_document(&self, id: &str) -> Result<Document> {
        let row = sqlx::query(
            "SELECT id, name, description, embedding, access_level FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_document(&r))
            .ok_or_else(|| EngineError::NotFound(format!("document {}", id)))
    }

    async fn list_documents(&self) -> Result<Vec<ProductView>> {
        let rows = sqlx::query(
            "SELECT id, name, description, access_level FROM documents ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let access: String = row.get("access_level");
                ProductView {
                    id: row.get("id"),
                    name: row.get("name"),
                    description: row.get("description"),
                    access_level: AccessLevel::parse(&access),
                }
            })
            .collect())
    }

    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM documents WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        if !exists {
            return Err(EngineError::NotFound(format!("document {}", id)));
        }

        sqlx::query(
            r#"
            UPDATE documents SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                access_level = COALESCE(?, access_level)
            WHERE id = ?
            "#,
        )
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(update.access_level.map(|a| a.as_str()))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_document_by_name(&self, name: &str) -> Result<Option<String>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM documents WHERE name = ? LIMIT 1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id)
    }

    async fn nearest_documents(
        &self,
        query: &[f32],
        limit: i64,
        access: Option<AccessLevel>,
    ) -> Result<Vec<Document>> {
        // The access filter lives in the WHERE clause: filtered rows are
        // never materialized outside the data layer.
        let rows = match access {
            Some(level) => {
                sqlx::query(
                    "SELECT id, name, description, embedding, access_level FROM documents WHERE access_level = ?",
                )
                .bind(level.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT id, name, description, embedding, access_level FROM documents")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut scored: Vec<(f32, Document)> = rows
            .iter()
            .map(|row| {
                let doc = row_to_document(row);
                (l2_distance_sq(query, &doc.embedding), doc)
            })
            .collect();

        // Stable sort: ties keep row order, which SQLite keeps stable for
        // an unordered scan of an unchanging table.
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(0) as usize);

        Ok(scored.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn distinct_customer_names(&self) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT customer_name FROM sales ORDER BY customer_name")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    async fn recent_sales_for_customers(
        &self,
        names: &[String],
        limit: i64,
    ) -> Result<Vec<SaleWithProduct>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            r#"
            SELECT s.id, s.document_id, s.quantity, s.price_total, s.sale_date,
                   s.category, s.region, s.customer_type, s.customer_name, s.seller_name,
                   d.name AS product_name
            FROM sales s
            JOIN documents d ON d.id = s.document_id
            WHERE s.customer_name IN ({})
            ORDER BY s.sale_date DESC
            LIMIT ?
            "#,
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for name in names {
            query = query.bind(name);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| SaleWithProduct {
                sale: row_to_sale(row),
                product_name: row.get("product_name"),
            })
            .collect())
    }

    async fn commit_batch(&self, batch: StagedBatch) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for doc in &batch.documents {
            insert_document_tx(&mut *tx, doc).await?;
        }

        for sale in &batch.sales {
            sqlx::query(
                r#"
                INSERT INTO sales (id, document_id, quantity, price_total, sale_date,
                                   category, region, customer_type, customer_name, seller_name)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&sale.id)
            .bind(&sale.document_id)
            .bind(sale.quantity)
            .bind(sale.price_total)
            .bind(sale.sale_date.timestamp())
            .bind(&sale.category)
            .bind(&sale.region)
            .bind(&sale.customer_type)
            .bind(&sale.customer_name)
            .bind(&sale.seller_name)
            .execute(&mut *tx)
            .await?;
        }

        for raw_id in &batch.consumed_raw {
            sqlx::query("DELETE FROM raw_records WHERE id = ?")
                .bind(raw_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let total_documents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        let public_documents: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE access_level = 'public'")
                .fetch_one(&self.pool)
                .await?;
        let total_sales: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        let pending_raw_records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raw_records")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreStats {
            total_documents,
            public_documents,
            private_documents: total_documents - public_documents,
            total_sales,
            pending_raw_records,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use chrono::TimeZone;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_store() -> SqliteStore {
        // A single connection keeps the in-memory database alive and shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate::apply_schema(&pool).await.unwrap();
        SqliteStore::new(pool)
    }

    fn doc(id: &str, name: &str, embedding: Vec<f32>, access_level: AccessLevel) -> Document {
        Document {
            id: id.to_string(),
            name: name.to_string(),
            description: format!("{} description", name),
            embedding,
            access_level,
        }
    }

    fn sale(id: &str, document_id: &str, customer: &str, ts: i64) -> SaleRecord {
        SaleRecord {
            id: id.to_string(),
            document_id: document_id.to_string(),
            quantity: 1,
            price_total: 10.0,
            sale_date: Utc.timestamp_opt(ts, 0).unwrap(),
            category: "General".to_string(),
            region: "Global".to_string(),
            customer_type: "Individual".to_string(),
            customer_name: customer.to_string(),
            seller_name: "Vendedor Sin Asignar".to_string(),
        }
    }

    #[tokio::test]
    async fn test_raw_record_roundtrip() {
        let store = test_store().await;
        let record = RawRecord::new("n8n", serde_json::json!({"price_total": 5}));
        store.insert_raw_record(&record).await.unwrap();

        let fetched = store.fetch_raw_records(10).await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].id, record.id);
        assert_eq!(fetched[0].source, "n8n");
        assert_eq!(fetched[0].payload, serde_json::json!({"price_total": 5}));
    }

    #[tokio::test]
    async fn test_document_roundtrip_preserves_embedding() {
        let store = test_store().await;
        let original = doc("d1", "Widget", vec![0.25, -1.5, 3.0], AccessLevel::Public);
        store.insert_document(&original).await.unwrap();

        let fetched = store.get_document("d1").await.unwrap();
        assert_eq!(fetched.embedding, original.embedding);
        assert_eq!(fetched.access_level, AccessLevel::Public);
    }

    #[tokio::test]
    async fn test_get_document_missing_is_not_found() {
        let store = test_store().await;
        let err = store.get_document("missing").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_document_partial_fields() {
        let store = test_store().await;
        store
            .insert_document(&doc("d1", "Widget", vec![1.0], AccessLevel::Private))
            .await
            .unwrap();

        let update = DocumentUpdate {
            access_level: Some(AccessLevel::Public),
            ..Default::default()
        };
        store.update_document("d1", &update).await.unwrap();

        let fetched = store.get_document("d1").await.unwrap();
        assert_eq!(fetched.name, "Widget");
        assert_eq!(fetched.access_level, AccessLevel::Public);

        let err = store
            .update_document("missing", &update)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_nearest_documents_filters_in_query() {
        let store = test_store().await;
        store
            .insert_document(&doc("d1", "Salaries", vec![0.0, 0.0], AccessLevel::Private))
            .await
            .unwrap();
        store
            .insert_document(&doc("d2", "Laptop", vec![9.0, 9.0], AccessLevel::Public))
            .await
            .unwrap();

        let unfiltered = store
            .nearest_documents(&[0.0, 0.0], 3, None)
            .await
            .unwrap();
        assert_eq!(unfiltered[0].name, "Salaries");

        let filtered = store
            .nearest_documents(&[0.0, 0.0], 3, Some(AccessLevel::Public))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Laptop");
    }

    #[tokio::test]
    async fn test_recent_sales_for_customers_orders_and_limits() {
        let store = test_store().await;
        store
            .insert_document(&doc("d1", "Widget", vec![1.0], AccessLevel::Public))
            .await
            .unwrap();

        let batch = StagedBatch {
            documents: Vec::new(),
            sales: vec![
                sale("s1", "d1", "Alpha Systems", 1_000),
                sale("s2", "d1", "Alpha Systems", 3_000),
                sale("s3", "d1", "Beta Corp", 2_000),
                sale("s4", "d1", "Unrelated", 9_000),
            ],
            consumed_raw: Vec::new(),
        };
        store.commit_batch(batch).await.unwrap();

        let names = vec!["Alpha Systems".to_string(), "Beta Corp".to_string()];
        let found = store.recent_sales_for_customers(&names, 2).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].sale.id, "s2");
        assert_eq!(found[1].sale.id, "s3");
        assert_eq!(found[0].product_name, "Widget");

        assert!(store
            .recent_sales_for_customers(&[], 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_commit_batch_deletes_consumed_raw_records() {
        let store = test_store().await;
        let record = RawRecord::new("manual", serde_json::json!({"name": "x"}));
        store.insert_raw_record(&record).await.unwrap();

        let batch = StagedBatch {
            documents: vec![doc("d1", "x", vec![1.0], AccessLevel::Private)],
            sales: Vec::new(),
            consumed_raw: vec![record.id.clone()],
        };
        store.commit_batch(batch).await.unwrap();

        assert!(store.fetch_raw_records(10).await.unwrap().is_empty());
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_documents, 1);
        assert_eq!(stats.pending_raw_records, 0);
    }

    #[tokio::test]
    async fn test_stats_counts_by_access_level() {
        let store = test_store().await;
        store
            .insert_document(&doc("d1", "a", vec![1.0], AccessLevel::Public))
            .await
            .unwrap();
        store
            .insert_document(&doc("d2", "b", vec![1.0], AccessLevel::Private))
            .await
            .unwrap();
        store
            .insert_document(&doc("d3", "c", vec![1.0], AccessLevel::Private))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_documents, 3);
        assert_eq!(stats.public_documents, 1);
        assert_eq!(stats.private_documents, 2);
    }
}
