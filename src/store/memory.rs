//! In-memory [`EntityStore`] implementation for tests.
//!
//! Uses `Vec`s behind `std::sync::RwLock` for thread safety. Insertion
//! order doubles as the store's stable ordering, so nearest-neighbor ties
//! and raw-record fetch order are deterministic in tests. Vector search is
//! a brute-force L2 scan over all stored documents.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::l2_distance_sq;
use crate::error::{EngineError, Result};
use crate::models::{
    AccessLevel, Document, DocumentUpdate, ProductView, RawRecord, SaleRecord, SaleWithProduct,
    StoreStats,
};

use super::{EntityStore, StagedBatch};

/// In-memory store for unit tests.
#[derive(Default)]
pub struct MemoryStore {
    raw: RwLock<Vec<RawRecord>>,
    docs: RwLock<Vec<Document>>,
    sales: RwLock<Vec<SaleRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents; test helper.
    pub fn document_count(&self) -> usize {
        self.docs.read().unwrap().len()
    }

    /// Number of stored sales; test helper.
    pub fn sale_count(&self) -> usize {
        self.sales.read().unwrap().len()
    }

    /// Number of unconsumed raw records; test helper.
    pub fn raw_count(&self) -> usize {
        self.raw.read().unwrap().len()
    }

    /// Snapshot of all sales; test helper.
    pub fn sales_snapshot(&self) -> Vec<SaleRecord> {
        self.sales.read().unwrap().clone()
    }

    /// Snapshot of all documents; test helper.
    pub fn documents_snapshot(&self) -> Vec<Document> {
        self.docs.read().unwrap().clone()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert_raw_record(&self, record: &RawRecord) -> Result<()> {
        self.raw.write().unwrap().push(record.clone());
        Ok(())
    }

    async fn fetch_raw_records(&self, limit: i64) -> Result<Vec<RawRecord>> {
        let raw = self.raw.read().unwrap();
        Ok(raw.iter().take(limit.max(0) as usize).cloned().collect())
    }

    async fn insert_document(&self, doc: &Document) -> Result<()> {
        self.docs.write().unwrap().push(doc.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Document> {
        let docs = self.docs.read().unwrap();
        docs.iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("document {}", id)))
    }

    async fn list_documents(&self) -> Result<Vec<ProductView>> {
        let docs = self.docs.read().unwrap();
        Ok(docs
            .iter()
            .map(|d| ProductView {
                id: d.id.clone(),
                name: d.name.clone(),
                description: d.description.clone(),
                access_level: d.access_level,
            })
            .collect())
    }

    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<()> {
        let mut docs = self.docs.write().unwrap();
        let doc = docs
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| EngineError::NotFound(format!("document {}", id)))?;

        if let Some(ref name) = update.name {
            doc.name = name.clone();
        }
        if let Some(ref description) = update.description {
            doc.description = description.clone();
        }
        if let Some(access_level) = update.access_level {
            doc.access_level = access_level;
        }
        Ok(())
    }

    async fn find_document_by_name(&self, name: &str) -> Result<Option<String>> {
        let docs = self.docs.read().unwrap();
        Ok(docs.iter().find(|d| d.name == name).map(|d| d.id.clone()))
    }

    async fn nearest_documents(
        &self,
        query: &[f32],
        limit: i64,
        access: Option<AccessLevel>,
    ) -> Result<Vec<Document>> {
        let docs = self.docs.read().unwrap();
        let mut scored: Vec<(f32, &Document)> = docs
            .iter()
            .filter(|d| access.map_or(true, |level| d.access_level == level))
            .map(|d| (l2_distance_sq(query, &d.embedding), d))
            .collect();

        // Stable sort: ties keep insertion order.
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit.max(0) as usize);

        Ok(scored.into_iter().map(|(_, d)| d.clone()).collect())
    }

    async fn distinct_customer_names(&self) -> Result<Vec<String>> {
        let sales = self.sales.read().unwrap();
        let mut names: Vec<String> = Vec::new();
        for sale in sales.iter() {
            if !names.contains(&sale.customer_name) {
                names.push(sale.customer_name.clone());
            }
        }
        Ok(names)
    }

    async fn recent_sales_for_customers(
        &self,
        names: &[String],
        limit: i64,
    ) -> Result<Vec<SaleWithProduct>> {
        let sales = self.sales.read().unwrap();
        let docs = self.docs.read().unwrap();

        let mut matched: Vec<&SaleRecord> = sales
            .iter()
            .filter(|s| names.contains(&s.customer_name))
            .collect();
        matched.sort_by(|a, b| b.sale_date.cmp(&a.sale_date));
        matched.truncate(limit.max(0) as usize);

        Ok(matched
            .into_iter()
            .filter_map(|sale| {
                docs.iter()
                    .find(|d| d.id == sale.document_id)
                    .map(|doc| SaleWithProduct {
                        sale: sale.clone(),
                        product_name: doc.name.clone(),
                    })
            })
            .collect())
    }

    async fn commit_batch(&self, batch: StagedBatch) -> Result<()> {
        let mut raw = self.raw.write().unwrap();
        let mut docs = self.docs.write().unwrap();
        let mut sales = self.sales.write().unwrap();

        docs.extend(batch.documents);
        sales.extend(batch.sales);
        raw.retain(|r| !batch.consumed_raw.contains(&r.id));
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let docs = self.docs.read().unwrap();
        let public = docs
            .iter()
            .filter(|d| d.access_level == AccessLevel::Public)
            .count() as i64;
        let total = docs.len() as i64;

        Ok(StoreStats {
            total_documents: total,
            public_documents: public,
            private_documents: total - public,
            total_sales: self.sales.read().unwrap().len() as i64,
            pending_raw_records: self.raw.read().unwrap().len() as i64,
        })
    }
}
