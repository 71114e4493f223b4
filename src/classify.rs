//! Payload classification: raw JSON elements into typed candidates.
//!
//! Every payload element is sniffed into a [`RecordCandidate`] before any
//! further processing, so the batch processor branches on one tagged union
//! instead of ad hoc key lookups. An element is a sale iff it is a JSON
//! object carrying a `sale_date` or `price_total` key; every other shape
//! (objects without those keys, strings, numbers, arrays, null) becomes a
//! document candidate.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::models::AccessLevel;

/// Wire format of the `sale_date` field.
const SALE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Product name used when a sale element does not declare one.
pub const UNKNOWN_PRODUCT_NAME: &str = "Producto Desconocido";

/// A payload element after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordCandidate {
    Sale(SaleCandidate),
    Document(DocumentCandidate),
}

/// A sale-shaped element with every field resolved to a value or its
/// documented default.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleCandidate {
    pub product_name: String,
    pub quantity: i64,
    pub price_total: f64,
    pub sale_date: DateTime<Utc>,
    pub category: String,
    pub region: String,
    pub customer_type: String,
    pub customer_name: String,
    pub seller_name: String,
    pub access_level: AccessLevel,
    /// Canonical JSON rendering of the element, used to embed the
    /// auto-created product document.
    pub raw_text: String,
}

/// A document-shaped element with its display name resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentCandidate {
    pub name: String,
    /// Canonical JSON rendering of the element; doubles as the stored
    /// description and as the text that gets embedded.
    pub body: String,
    pub access_level: AccessLevel,
}

/// Normalize a raw payload into a sequence of elements: a list is iterated
/// as-is, anything else becomes a one-element sequence.
pub fn normalize_payload(payload: &Value) -> Vec<&Value> {
    match payload {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Classify one payload element.
///
/// `now` is the fallback timestamp for missing or unparseable sale dates;
/// callers pass the batch start time so a bad date never fails the batch.
pub fn classify(element: &Value, raw_record_id: &str, now: DateTime<Utc>) -> RecordCandidate {
    match element.as_object() {
        Some(map) if map.contains_key("sale_date") || map.contains_key("price_total") => {
            RecordCandidate::Sale(SaleCandidate {
                product_name: str_field(element, "product_name", UNKNOWN_PRODUCT_NAME),
                quantity: element
                    .get("quantity")
                    .and_then(Value::as_i64)
                    .unwrap_or(1),
                price_total: element
                    .get("price_total")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                sale_date: parse_sale_date(element, now),
                category: str_field(element, "category", "General"),
                region: str_field(element, "region", "Global"),
                customer_type: str_field(element, "customer_type", "Individual"),
                customer_name: str_field(element, "customer_name", "Cliente Genérico"),
                seller_name: str_field(element, "seller_name", "Vendedor Sin Asignar"),
                access_level: access_level_field(element),
                raw_text: element.to_string(),
            })
        }
        _ => RecordCandidate::Document(DocumentCandidate {
            name: display_name(element, raw_record_id),
            body: element.to_string(),
            access_level: access_level_field(element),
        }),
    }
}

/// Resolve a document display name by scanning, in priority order, for the
/// first key holding a string. Non-mapping elements and mappings without
/// any candidate key fall back to `"Dato Crudo {raw_record_id}"`.
fn display_name(element: &Value, raw_record_id: &str) -> String {
    for key in ["name", "product_name", "nombre", "title"] {
        if let Some(name) = element.get(key).and_then(Value::as_str) {
            return name.to_string();
        }
    }
    format!("Dato Crudo {}", raw_record_id)
}

fn str_field(element: &Value, key: &str, default: &str) -> String {
    element
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn access_level_field(element: &Value) -> AccessLevel {
    element
        .get("access_level")
        .and_then(Value::as_str)
        .map(AccessLevel::parse)
        .unwrap_or_default()
}

fn parse_sale_date(element: &Value, now: DateTime<Utc>) -> DateTime<Utc> {
    element
        .get("sale_date")
        .and_then(Value::as_str)
        .and_then(|s| NaiveDateTime::parse_from_str(s, SALE_DATE_FORMAT).ok())
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}
