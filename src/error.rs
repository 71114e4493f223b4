//! Error taxonomy for the ingestion and answering pipeline.
//!
//! Per-element embedding failures during ingestion are deliberately not
//! represented here: the batch processor treats them as soft skips and the
//! batch continues. Everything that aborts a whole call is an
//! [`EngineError`].

use thiserror::Error;

/// Call-level failures surfaced to the routing layer and the CLI.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The embedding or completion provider failed while answering a
    /// question. No partial answer is returned.
    #[error("upstream provider error: {0}")]
    Upstream(String),

    /// Persistence or query failure. Staged-but-uncommitted writes of the
    /// failing call are discarded.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// A referenced entity does not exist. Rendered as a 404 by the HTTP
    /// layer, distinct from other store failures.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller supplied a role string outside the known set. Rejected
    /// instead of falling through to unrestricted access.
    #[error("unknown role: {0:?} (expected \"customer\" or \"admin\")")]
    InvalidRole(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
