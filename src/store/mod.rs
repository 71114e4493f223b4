//! Storage abstraction for Sales Insight.
//!
//! The [`EntityStore`] trait defines all storage operations needed by the
//! batch processor and the answering engine, enabling pluggable backends
//! (SQLite, in-memory for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AccessLevel, Document, DocumentUpdate, ProductView, RawRecord, SaleRecord, SaleWithProduct,
    StoreStats,
};

/// Writes staged by one `process_batch` call, committed atomically.
///
/// The processor accumulates new documents and sales plus the ids of the
/// raw records they came from, then hands the whole thing to
/// [`EntityStore::commit_batch`] in one shot. Nothing touches the store
/// until then, so an aborted batch leaves no partial state behind.
#[derive(Debug, Default)]
pub struct StagedBatch {
    pub documents: Vec<Document>,
    pub sales: Vec<SaleRecord>,
    /// Raw records consumed by this batch, deleted on commit.
    pub consumed_raw: Vec<String>,
}

impl StagedBatch {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.sales.is_empty() && self.consumed_raw.is_empty()
    }
}

/// Abstract storage backend for Sales Insight.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_raw_record`](EntityStore::insert_raw_record) | Persist an unprocessed ingested unit |
/// | [`fetch_raw_records`](EntityStore::fetch_raw_records) | Fetch up to N raw records for processing |
/// | [`insert_document`](EntityStore::insert_document) | Persist a document directly (seeding, tests) |
/// | [`get_document`](EntityStore::get_document) | Retrieve a document by id |
/// | [`list_documents`](EntityStore::list_documents) | List all documents without embeddings |
/// | [`update_document`](EntityStore::update_document) | Partial-field document edit |
/// | [`find_document_by_name`](EntityStore::find_document_by_name) | Exact-name lookup for sale resolution |
/// | [`nearest_documents`](EntityStore::nearest_documents) | L2 nearest-neighbor query with access filter |
/// | [`distinct_customer_names`](EntityStore::distinct_customer_names) | All customer names across sales |
/// | [`recent_sales_for_customers`](EntityStore::recent_sales_for_customers) | Recent sales for a set of customers |
/// | [`commit_batch`](EntityStore::commit_batch) | Atomically apply one staged batch |
/// | [`stats`](EntityStore::stats) | Inventory counters |
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn insert_raw_record(&self, record: &RawRecord) -> Result<()>;

    /// Fetch up to `limit` raw records in store order.
    async fn fetch_raw_records(&self, limit: i64) -> Result<Vec<RawRecord>>;

    async fn insert_document(&self, doc: &Document) -> Result<()>;

    /// Retrieve a document by id; [`EngineError::NotFound`] when missing.
    ///
    /// [`EngineError::NotFound`]: crate::error::EngineError::NotFound
    async fn get_document(&self, id: &str) -> Result<Document>;

    async fn list_documents(&self) -> Result<Vec<ProductView>>;

    /// Apply a partial edit; [`EngineError::NotFound`] when missing.
    ///
    /// [`EngineError::NotFound`]: crate::error::EngineError::NotFound
    async fn update_document(&self, id: &str, update: &DocumentUpdate) -> Result<()>;

    /// Exact-name document lookup, returning the id if one exists.
    async fn find_document_by_name(&self, name: &str) -> Result<Option<String>>;

    /// The `limit` documents nearest to `query` by ascending Euclidean
    /// distance. When `access` is set, the filter is applied inside the
    /// store query — filtered rows never leave the data layer.
    async fn nearest_documents(
        &self,
        query: &[f32],
        limit: i64,
        access: Option<AccessLevel>,
    ) -> Result<Vec<Document>>;

    /// Distinct customer names across all sales. Full scan; fine at the
    /// scale this service runs at.
    async fn distinct_customer_names(&self) -> Result<Vec<String>>;

    /// Up to `limit` most recent sales (sale date descending) whose
    /// customer name is in `names`, each with its product name resolved.
    async fn recent_sales_for_customers(
        &self,
        names: &[String],
        limit: i64,
    ) -> Result<Vec<SaleWithProduct>>;

    /// Insert all staged documents and sales and delete the consumed raw
    /// records in one transaction. All or nothing.
    async fn commit_batch(&self, batch: StagedBatch) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;
}
