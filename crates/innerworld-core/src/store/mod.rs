//! Document store abstraction.
//!
//! The remote store is an external collaborator: collections of JSON
//! documents with create/update/delete, one-shot queries, and live
//! queries that push the full ordered result set on every change.
//! [`SceneStoreClient`] is the typed layer the rest of the crate uses.

mod client;
mod file;
mod memory;
mod query;
mod subscription;

pub use client::{SHAPES_COLLECTION, SceneStoreClient, ShapeSubscription, WORLDS_COLLECTION};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use query::{Direction, Filter, OrderBy, Query};
pub use subscription::Subscription;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Field that carries the owning account on every document.
pub const OWNER_FIELD: &str = "owner_system_id";

/// Document body, without its id.
pub type Fields = serde_json::Map<String, Value>;

/// Store errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Subscription closed")]
    Closed,
    #[error("Store error: {0}")]
    Other(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// A stored document: its id plus its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self { id: id.into(), fields }
    }

    /// Field lookup. `"id"` resolves to the document id.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == "id" {
            return Some(Value::String(self.id.clone()));
        }
        self.fields.get(field).cloned()
    }

    /// Deserialize into a typed entity, injecting the id.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| StoreError::Serialization(format!("{}: {}", self.id, e)))
    }
}

/// Serialize a typed value into document fields.
pub fn encode_fields<T: Serialize>(value: &T) -> StoreResult<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StoreError::Serialization(format!("Expected an object, got {}", other))),
        Err(e) => Err(StoreError::Serialization(e.to_string())),
    }
}

/// Trait for document store backends.
///
/// Writes are at-least-once from the caller's point of view; retry and
/// offline queueing are the backend's business.
pub trait DocumentStore: Send + Sync {
    /// Create a document; the store assigns the id.
    fn create(&self, collection: &str, fields: Fields) -> BoxFuture<'_, StoreResult<String>>;

    /// Load one document.
    fn get(&self, collection: &str, id: &str) -> BoxFuture<'_, StoreResult<Document>>;

    /// Shallow-merge fields into a document. `null` removes a field.
    fn update(&self, collection: &str, id: &str, fields: Fields) -> BoxFuture<'_, StoreResult<()>>;

    /// Delete a document. Deleting a missing document is not an error.
    fn delete(&self, collection: &str, id: &str) -> BoxFuture<'_, StoreResult<()>>;

    /// Run a query once.
    fn query(&self, collection: &str, query: &Query) -> BoxFuture<'_, StoreResult<Vec<Document>>>;

    /// Open a live query. The current result set is delivered right away
    /// and again after every change to it.
    fn subscribe(&self, collection: &str, query: Query) -> StoreResult<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        label: String,
    }

    #[test]
    fn test_decode_injects_id() {
        let fields = encode_fields(&json!({ "label": "tree" })).unwrap();
        let doc = Document::new("abc", fields);
        let item: Item = doc.decode().unwrap();
        assert_eq!(item, Item { id: "abc".to_string(), label: "tree".to_string() });
    }

    #[test]
    fn test_decode_reports_bad_documents() {
        let doc = Document::new("abc", Fields::new());
        assert!(matches!(doc.decode::<Item>(), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_encode_rejects_non_objects() {
        assert!(matches!(encode_fields(&42), Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_document_json_is_flat() {
        let doc = Document::new("abc", encode_fields(&json!({ "label": "tree" })).unwrap());
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({ "id": "abc", "label": "tree" }));
    }
}
