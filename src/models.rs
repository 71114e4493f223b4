//! Core data models used throughout Sales Insight.
//!
//! These types represent the raw records, documents, and sales that flow
//! through the ingestion and answering pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Two-tier visibility flag on a [`Document`].
///
/// `Public` rows are retrievable by customer-facing callers; `Private`
/// rows are only retrievable by admin callers. Defaults to `Private` so
/// freshly ingested content is never exposed by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Public,
    #[default]
    Private,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Private => "private",
        }
    }

    /// Parse a stored or payload-supplied access level. Anything that is
    /// not exactly `"public"` collapses to `Private`.
    pub fn parse(value: &str) -> Self {
        if value == "public" {
            AccessLevel::Public
        } else {
            AccessLevel::Private
        }
    }
}

/// Caller role for retrieval filtering.
///
/// Exhaustive by construction: unknown role strings fail to parse and are
/// rejected at the call boundary instead of silently falling through to
/// unrestricted access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(EngineError::InvalidRole(other.to_string())),
        }
    }
}

/// An unprocessed ingested unit awaiting classification.
///
/// Created on ingestion, consumed (deleted) exactly once by the batch
/// processor, never mutated in between.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub id: String,
    /// Origin tag, e.g. `"web_scraping_ventas"` or `"manual"`.
    pub source: String,
    /// Untyped payload: a single record-shaped value or a list of them.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl RawRecord {
    pub fn new(source: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}

/// A retrievable knowledge unit with an embedding and an access level.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub description: String,
    /// Fixed dimensionality per the configured embedding provider. All
    /// rows taking part in one nearest-neighbor query must agree.
    pub embedding: Vec<f32>,
    pub access_level: AccessLevel,
}

/// A transaction referencing the [`Document`] of the product sold.
#[derive(Debug, Clone)]
pub struct SaleRecord {
    pub id: String,
    pub document_id: String,
    pub quantity: i64,
    pub price_total: f64,
    pub sale_date: DateTime<Utc>,
    pub category: String,
    pub region: String,
    pub customer_type: String,
    pub customer_name: String,
    pub seller_name: String,
}

/// A sale joined with the name of its owning product document, as
/// returned by the sales-history retrieval query.
#[derive(Debug, Clone)]
pub struct SaleWithProduct {
    pub sale: SaleRecord,
    pub product_name: String,
}

/// Embedding-free document view for listings and API responses.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub access_level: AccessLevel,
}

/// Partial-field document edit. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub access_level: Option<AccessLevel>,
}

impl DocumentUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.access_level.is_none()
    }
}

/// Inventory counters reported by `GET /stats` and `insight stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_documents: i64,
    pub public_documents: i64,
    pub private_documents: i64,
    pub total_sales: i64,
    pub pending_raw_records: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_access_level_parse() {
        assert_eq!(AccessLevel::parse("public"), AccessLevel::Public);
        assert_eq!(AccessLevel::parse("private"), AccessLevel::Private);
        assert_eq!(AccessLevel::parse("PUBLIC"), AccessLevel::Private);
        assert_eq!(AccessLevel::parse(""), AccessLevel::Private);
    }

    #[test]
    fn test_access_level_default_is_private() {
        assert_eq!(AccessLevel::default(), AccessLevel::Private);
    }

    #[test]
    fn test_role_parses_known_values() {
        assert_eq!(Role::from_str("customer").unwrap(), Role::Customer);
        assert_eq!(Role::from_str("admin").unwrap(), Role::Admin);
    }

    #[test]
    fn test_role_rejects_unknown_values() {
        assert!(Role::from_str("root").is_err());
        assert!(Role::from_str("Admin").is_err());
        assert!(Role::from_str("").is_err());
    }

    #[test]
    fn test_document_update_is_empty() {
        assert!(DocumentUpdate::default().is_empty());
        let update = DocumentUpdate {
            name: Some("Laptop".to_string()),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
