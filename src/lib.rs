//! # Sales Insight
//!
//! A retrieval-augmented business knowledge backend.
//!
//! Sales Insight ingests arbitrary business records, classifies every
//! payload element as a knowledge document or a sales transaction, embeds
//! free text for semantic search, and answers natural-language questions
//! by retrieving relevant documents and sales and forwarding them as
//! context to an LLM completion call. A two-tier access filter restricts
//! what customer-facing callers may retrieve.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌──────────┐
//! │ Raw JSON  │──▶│  Processor    │──▶│  SQLite   │
//! │ payloads  │   │ Classify+Embed│   │ BLOB vecs │
//! └───────────┘   └──────────────┘   └────┬─────┘
//!                                         │
//!                     ┌───────────────────┤
//!                     ▼                   ▼
//!                ┌──────────┐       ┌──────────┐
//!                │   CLI    │       │   HTTP   │
//!                │(insight) │       │  (chat)  │
//!                └──────────┘       └──────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. Raw payloads arrive via `POST /ingestion` or `insight ingest` and
//!    are stored untouched as [`models::RawRecord`]s.
//! 2. The **batch processor** ([`processor`]) classifies every payload
//!    element ([`classify`]) into a sale or a document, resolves the
//!    product document behind each sale (auto-creating it when unknown),
//!    embeds document text ([`embedding`]), and commits the whole batch in
//!    one store transaction.
//! 3. The **answering engine** ([`answer`]) embeds the question, retrieves
//!    the nearest documents under the caller's access filter, attaches
//!    recent sales for mentioned customers ([`matching`]), and issues one
//!    completion call ([`completion`]).
//! 4. Both flows go through the [`store::EntityStore`] trait, backed by
//!    SQLite ([`sqlite_store`]) in production and an in-memory store in
//!    tests.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types: `RawRecord`, `Document`, `SaleRecord`, `Role` |
//! | [`error`] | Call-level error taxonomy |
//! | [`classify`] | Payload classification into sale/document candidates |
//! | [`matching`] | Customer-name matching against question text |
//! | [`embedding`] | Embedding provider trait, OpenAI/Ollama implementations, vector utilities |
//! | [`completion`] | Completion provider trait and OpenAI implementation |
//! | [`store`] | `EntityStore` trait and in-memory backend |
//! | [`sqlite_store`] | SQLite `EntityStore` backend |
//! | [`processor`] | Batch processing of raw records into entities |
//! | [`answer`] | Retrieval-augmented answering |
//! | [`server`] | HTTP API server (Axum) with CORS |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//!
//! ## Configuration
//!
//! Sales Insight is configured via a TOML file (default:
//! `config/insight.toml`). See [`config`] for all available options and
//! [`config::load_config`] for validation rules.

pub mod answer;
pub mod classify;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod matching;
pub mod migrate;
pub mod models;
pub mod processor;
pub mod server;
pub mod sqlite_store;
pub mod store;

pub use error::EngineError;
pub use models::{AccessLevel, Document, RawRecord, Role, SaleRecord};
pub use store::EntityStore;
