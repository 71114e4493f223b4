//! Batch processing of raw records into typed entities.
//!
//! Consumes unprocessed [`RawRecord`]s, classifies every payload element as
//! a sale or a knowledge document, resolves or auto-creates the product
//! document behind each sale, and commits everything in one store
//! transaction at the end of the batch.
//!
//! Two invariants shape this module:
//! - An embedding failure on one element skips that element only; the
//!   batch keeps going and the element still counts as processed, because
//!   all elements of a raw record are consumed together.
//! - Nothing is written until the final [`commit_batch`] — an aborted call
//!   leaves no partial state, and the client-generated document ids let
//!   staged sales link to staged documents before anything is persisted.
//!
//! [`RawRecord`]: crate::models::RawRecord
//! [`commit_batch`]: crate::store::EntityStore::commit_batch

use std::collections::HashMap;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::classify::{classify, normalize_payload, RecordCandidate};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::models::{Document, SaleRecord};
use crate::store::{EntityStore, StagedBatch};

/// Process up to `limit` raw records and return the number of payload
/// elements consumed.
///
/// Elements are processed strictly in sequence: later sale elements read
/// the per-batch product cache that earlier elements populate. The cache
/// maps product names to document ids and lives exactly as long as this
/// call, so two sales of the same product in one batch share a single
/// (possibly auto-created) document.
pub async fn process_batch(
    store: &dyn EntityStore,
    embedder: &dyn EmbeddingProvider,
    limit: i64,
) -> Result<usize> {
    let raw_records = store.fetch_raw_records(limit).await?;
    let batch_start = Utc::now();

    let mut staged = StagedBatch::default();
    let mut product_cache: HashMap<String, String> = HashMap::new();
    let mut processed = 0usize;
    let mut skipped = 0usize;

    for record in &raw_records {
        let elements = normalize_payload(&record.payload);

        for element in &elements {
            match classify(element, &record.id, batch_start) {
                RecordCandidate::Sale(sale) => {
                    let document_id = match product_cache.get(&sale.product_name) {
                        Some(id) => id.clone(),
                        None => {
                            match resolve_product_document(store, embedder, &sale, &mut staged)
                                .await?
                            {
                                Some(id) => id,
                                None => {
                                    skipped += 1;
                                    continue;
                                }
                            }
                        }
                    };
                    product_cache.insert(sale.product_name.clone(), document_id.clone());

                    staged.sales.push(SaleRecord {
                        id: Uuid::new_v4().to_string(),
                        document_id,
                        quantity: sale.quantity,
                        price_total: sale.price_total,
                        sale_date: sale.sale_date,
                        category: sale.category,
                        region: sale.region,
                        customer_type: sale.customer_type,
                        customer_name: sale.customer_name,
                        seller_name: sale.seller_name,
                    });
                }
                RecordCandidate::Document(doc) => {
                    let embedding = match embedder.generate(&doc.body).await {
                        Ok(vector) if !vector.is_empty() => vector,
                        Ok(_) => {
                            warn!(raw_record = %record.id, "empty embedding, skipping element");
                            skipped += 1;
                            continue;
                        }
                        Err(e) => {
                            warn!(raw_record = %record.id, error = %e, "embedding failed, skipping element");
                            skipped += 1;
                            continue;
                        }
                    };

                    staged.documents.push(Document {
                        id: Uuid::new_v4().to_string(),
                        name: doc.name,
                        description: doc.body,
                        embedding,
                        access_level: doc.access_level,
                    });
                }
            }
        }

        // The whole record is consumed together, skips included.
        staged.consumed_raw.push(record.id.clone());
        processed += elements.len();
        debug!(raw_record = %record.id, elements = elements.len(), "raw record staged");
    }

    let documents_created = staged.documents.len();
    let sales_created = staged.sales.len();
    store.commit_batch(staged).await?;

    info!(
        records = raw_records.len(),
        elements = processed,
        documents = documents_created,
        sales = sales_created,
        skipped,
        "batch committed"
    );

    Ok(processed)
}

/// Resolve the document owning a sale: store lookup by exact product name
/// first, then auto-creation. Returns `None` when the document would have
/// to be auto-created but its embedding fails — the caller skips that sale
/// element and the batch continues.
async fn resolve_product_document(
    store: &dyn EntityStore,
    embedder: &dyn EmbeddingProvider,
    sale: &crate::classify::SaleCandidate,
    staged: &mut StagedBatch,
) -> Result<Option<String>> {
    if let Some(id) = store.find_document_by_name(&sale.product_name).await? {
        return Ok(Some(id));
    }

    let embedding = match embedder.generate(&sale.raw_text).await {
        Ok(vector) if !vector.is_empty() => vector,
        Ok(_) => {
            warn!(product = %sale.product_name, "empty embedding, skipping sale element");
            return Ok(None);
        }
        Err(e) => {
            warn!(product = %sale.product_name, error = %e, "embedding failed, skipping sale element");
            return Ok(None);
        }
    };

    let document = Document {
        id: Uuid::new_v4().to_string(),
        name: sale.product_name.clone(),
        description: format!("Auto-creado desde venta: {}", sale.product_name),
        embedding,
        access_level: sale.access_level,
    };
    let id = document.id.clone();
    staged.documents.push(document);
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessLevel, RawRecord};
    use crate::store::memory::MemoryStore;
    use anyhow::bail;
    use async_trait::async_trait;
    use serde_json::json;

    /// Deterministic embedder: hashes the text into a small fixed vector.
    struct StubEmbedder;

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        fn model_name(&self) -> &str {
            "stub"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn generate(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let mut acc = [0.0f32; 4];
            for (i, b) in text.bytes().enumerate() {
                acc[i % 4] += b as f32 / 255.0;
            }
            Ok(acc.to_vec())
        }
    }

    /// Embedder that always fails, for skip-path tests.
    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> usize {
            0
        }
        async fn generate(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            bail!("provider down")
        }
    }

    async fn ingest(store: &MemoryStore, payload: serde_json::Value) -> RawRecord {
        let record = RawRecord::new("test", payload);
        store.insert_raw_record(&record).await.unwrap();
        record
    }

    #[tokio::test]
    async fn test_sale_element_creates_sale_and_product_document() {
        let store = MemoryStore::new();
        ingest(
            &store,
            json!([{
                "sale_date": "2024-01-01 10:00:00",
                "product_name": "Widget",
                "price_total": 100,
                "quantity": 2
            }]),
        )
        .await;

        let processed = process_batch(&store, &StubEmbedder, 10).await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(store.raw_count(), 0);

        let docs = store.documents_snapshot();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "Widget");
        assert_eq!(
            docs[0].description,
            "Auto-creado desde venta: Widget"
        );

        let sales = store.sales_snapshot();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].quantity, 2);
        assert_eq!(sales[0].price_total, 100.0);
        assert_eq!(sales[0].document_id, docs[0].id);
    }

    #[tokio::test]
    async fn test_same_product_twice_creates_one_document() {
        let store = MemoryStore::new();
        ingest(
            &store,
            json!([
                {"sale_date": "2024-01-01 10:00:00", "product_name": "Widget", "price_total": 50},
                {"sale_date": "2024-01-02 11:00:00", "product_name": "Widget", "price_total": 70}
            ]),
        )
        .await;

        let processed = process_batch(&store, &StubEmbedder, 10).await.unwrap();
        assert_eq!(processed, 2);
        assert_eq!(store.document_count(), 1);

        let sales = store.sales_snapshot();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].document_id, sales[1].document_id);
    }

    #[tokio::test]
    async fn test_sale_reuses_existing_document() {
        let store = MemoryStore::new();
        let existing = Document {
            id: "known".to_string(),
            name: "Widget".to_string(),
            description: "catálogo".to_string(),
            embedding: vec![1.0; 4],
            access_level: AccessLevel::Public,
        };
        store.insert_document(&existing).await.unwrap();

        ingest(
            &store,
            json!({"sale_date": "2024-01-01 10:00:00", "product_name": "Widget"}),
        )
        .await;

        process_batch(&store, &StubEmbedder, 10).await.unwrap();
        assert_eq!(store.document_count(), 1);
        assert_eq!(store.sales_snapshot()[0].document_id, "known");
    }

    #[tokio::test]
    async fn test_non_sale_elements_become_documents() {
        let store = MemoryStore::new();
        ingest(
            &store,
            json!([
                {"name": "FAQ", "contenido": "preguntas"},
                "una nota suelta",
                42
            ]),
        )
        .await;

        let processed = process_batch(&store, &StubEmbedder, 10).await.unwrap();
        assert_eq!(processed, 3);
        assert_eq!(store.document_count(), 3);
        assert_eq!(store.sale_count(), 0);

        let docs = store.documents_snapshot();
        assert_eq!(docs[0].name, "FAQ");
        assert!(docs[1].name.starts_with("Dato Crudo "));
        assert_eq!(docs[0].access_level, AccessLevel::Private);
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_element_but_counts_it() {
        let store = MemoryStore::new();
        ingest(&store, json!([{"name": "a"}, {"name": "b"}])).await;

        let processed = process_batch(&store, &FailingEmbedder, 10).await.unwrap();
        assert_eq!(processed, 2);
        assert_eq!(store.document_count(), 0);
        // The raw record is still consumed with its elements.
        assert_eq!(store.raw_count(), 0);
    }

    #[tokio::test]
    async fn test_sale_with_failing_embedder_is_skipped_without_aborting() {
        let store = MemoryStore::new();
        ingest(
            &store,
            json!([
                {"sale_date": "2024-01-01 10:00:00", "product_name": "Widget"},
                {"price_total": 10, "product_name": "Gadget"}
            ]),
        )
        .await;

        let processed = process_batch(&store, &FailingEmbedder, 10).await.unwrap();
        assert_eq!(processed, 2);
        assert_eq!(store.document_count(), 0);
        assert_eq!(store.sale_count(), 0);
        assert_eq!(store.raw_count(), 0);
    }

    #[tokio::test]
    async fn test_limit_bounds_fetched_records() {
        let store = MemoryStore::new();
        ingest(&store, json!({"name": "uno"})).await;
        ingest(&store, json!({"name": "dos"})).await;
        ingest(&store, json!({"name": "tres"})).await;

        let processed = process_batch(&store, &StubEmbedder, 2).await.unwrap();
        assert_eq!(processed, 2);
        assert_eq!(store.raw_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_sale_date_falls_back_to_batch_time() {
        let store = MemoryStore::new();
        let before = Utc::now();
        ingest(
            &store,
            json!({"sale_date": "not-a-date", "product_name": "Widget"}),
        )
        .await;

        process_batch(&store, &StubEmbedder, 10).await.unwrap();
        let sales = store.sales_snapshot();
        assert_eq!(sales.len(), 1);
        assert!(sales[0].sale_date >= before);
    }

    #[tokio::test]
    async fn test_empty_store_processes_nothing() {
        let store = MemoryStore::new();
        let processed = process_batch(&store, &StubEmbedder, 10).await.unwrap();
        assert_eq!(processed, 0);
    }
}
