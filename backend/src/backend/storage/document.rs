//! # Document Query Surface
//!
//! Snapshot/query value types shared by every [`DocumentStore`] plus the fluent
//! `collection(name).doc(id)` / `order_by(..).limit(..)` wrapper used by the
//! domain layer.
//!
//! ```ignore
//! let db = Database::new(store);
//! db.collection("orders").doc("o1").set(record, SetOptions::default()).await?;
//! let top = db.collection("orders")
//!     .order_by("quantity", SortDirection::Desc)
//!     .limit(1)
//!     .get()
//!     .await?;
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use shared::SortDirection;
use std::fmt;
use std::sync::Arc;

use super::traits::{DocumentStore, Record, StorageError};

/// Options for `set`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Shallow-merge onto existing fields instead of replacing the document
    pub merge: bool,
}

impl SetOptions {
    pub fn merge() -> Self {
        Self { merge: true }
    }
}

/// Result of reading a single document
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub exists: bool,
    data: Record,
}

impl DocumentSnapshot {
    pub fn found(id: impl Into<String>, data: Record) -> Self {
        Self { id: id.into(), exists: true, data }
    }

    pub fn missing(id: impl Into<String>) -> Self {
        Self { id: id.into(), exists: false, data: Record::new() }
    }

    /// Document fields; empty when the document does not exist
    pub fn data(&self) -> &Record {
        &self.data
    }

    pub fn into_data(self) -> Record {
        self.data
    }

    /// Deserialize the document into an application record type
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>, StorageError> {
        if !self.exists {
            return Ok(None);
        }
        let value = Value::Object(self.data.clone());
        Ok(Some(serde_json::from_value(value)?))
    }
}

/// Result of a query: documents in presentation order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySnapshot {
    pub docs: Vec<DocumentSnapshot>,
}

impl QuerySnapshot {
    pub fn from_records(records: Vec<Record>) -> Self {
        let docs = records
            .into_iter()
            .map(|record| {
                let id = record
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                DocumentSnapshot::found(id, record)
            })
            .collect();
        Self { docs }
    }

    pub fn size(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn records(&self) -> Vec<Record> {
        self.docs.iter().map(|d| d.data().clone()).collect()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.docs.into_iter().map(DocumentSnapshot::into_data).collect()
    }

    /// Deserialize every document, failing on the first one that does not fit `T`
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Vec<T>, StorageError> {
        self.docs
            .iter()
            .map(|d| serde_json::from_value(Value::Object(d.data().clone())).map_err(StorageError::from))
            .collect()
    }
}

/// Description of a collection query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub collection: String,
    pub order_by: Option<(String, SortDirection)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), order_by: None, limit: None }
    }
}

/// Callback invoked with query results
pub type SnapshotCallback = Arc<dyn Fn(QuerySnapshot) + Send + Sync>;

/// Handle returned by `on_snapshot`; call [`remove`](Self::remove) to unsubscribe
pub struct ListenerRegistration {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl ListenerRegistration {
    pub fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self { unsubscribe: Some(Box::new(unsubscribe)) }
    }

    /// A registration with nothing to clean up
    pub fn noop() -> Self {
        Self { unsubscribe: None }
    }

    pub fn remove(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Entry point for the fluent document API over any [`DocumentStore`]
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn collection(&self, name: impl Into<String>) -> CollectionRef {
        CollectionRef { store: self.store.clone(), name: name.into() }
    }
}

#[derive(Clone)]
pub struct CollectionRef {
    store: Arc<dyn DocumentStore>,
    name: String,
}

impl CollectionRef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self, id: impl Into<String>) -> DocumentRef {
        DocumentRef { store: self.store.clone(), collection: self.name.clone(), id: id.into() }
    }

    /// Reference to a new document under a generated id
    pub fn doc_auto(&self) -> DocumentRef {
        self.doc(uuid::Uuid::new_v4().to_string())
    }

    /// Write `data` under a generated id (or `data.id` when present) and return the id
    pub async fn add(&self, data: Record) -> Result<String, StorageError> {
        let doc = match data.get("id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => self.doc(id),
            _ => self.doc_auto(),
        };
        doc.set(data, SetOptions::default()).await?;
        Ok(doc.id)
    }

    /// Swap the whole collection for `records` in a single write
    pub async fn replace(&self, records: Vec<Record>) -> Result<(), StorageError> {
        self.store.replace_collection(&self.name, records).await
    }

    pub fn order_by(&self, field: impl Into<String>, direction: SortDirection) -> QueryRef {
        self.query().order_by(field, direction)
    }

    pub fn limit(&self, n: usize) -> QueryRef {
        self.query().limit(n)
    }

    pub async fn get(&self) -> Result<QuerySnapshot, StorageError> {
        self.query().get().await
    }

    pub async fn on_snapshot(
        &self,
        callback: impl Fn(QuerySnapshot) + Send + Sync + 'static,
    ) -> Result<ListenerRegistration, StorageError> {
        self.query().on_snapshot(callback).await
    }

    fn query(&self) -> QueryRef {
        QueryRef { store: self.store.clone(), query: Query::new(self.name.clone()) }
    }
}

#[derive(Clone)]
pub struct DocumentRef {
    store: Arc<dyn DocumentStore>,
    collection: String,
    id: String,
}

impl DocumentRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn get(&self) -> Result<DocumentSnapshot, StorageError> {
        self.store.get_document(&self.collection, &self.id).await
    }

    pub async fn set(&self, data: Record, options: SetOptions) -> Result<(), StorageError> {
        self.store.set_document(&self.collection, &self.id, data, options).await
    }

    /// Serialize a typed record and write it
    pub async fn set_typed<T: Serialize>(&self, value: &T, options: SetOptions) -> Result<(), StorageError> {
        match serde_json::to_value(value)? {
            Value::Object(map) => self.set(map, options).await,
            other => Err(StorageError::InvalidArgument(format!(
                "documents must serialize to a JSON object, got {}",
                json_type_name(&other)
            ))),
        }
    }

    pub async fn delete(&self) -> Result<bool, StorageError> {
        self.store.delete_document(&self.collection, &self.id).await
    }
}

#[derive(Clone)]
pub struct QueryRef {
    store: Arc<dyn DocumentStore>,
    query: Query,
}

impl QueryRef {
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.query.limit = Some(n);
        self
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub async fn get(&self) -> Result<QuerySnapshot, StorageError> {
        self.store.run_query(&self.query).await
    }

    pub async fn on_snapshot(
        &self,
        callback: impl Fn(QuerySnapshot) + Send + Sync + 'static,
    ) -> Result<ListenerRegistration, StorageError> {
        self.store.on_snapshot(&self.query, Arc::new(callback)).await
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_snapshot_has_empty_data() {
        let snapshot = DocumentSnapshot::missing("nope");
        assert!(!snapshot.exists);
        assert!(snapshot.data().is_empty());
        let typed: Option<shared::Order> = snapshot.data_as().unwrap();
        assert!(typed.is_none());
    }

    #[test]
    fn test_query_snapshot_reads_ids_from_records() {
        let records = vec![
            json!({"id": "a", "n": 1}).as_object().unwrap().clone(),
            json!({"id": "b", "n": 2}).as_object().unwrap().clone(),
        ];
        let snapshot = QuerySnapshot::from_records(records);
        assert_eq!(snapshot.size(), 2);
        assert_eq!(snapshot.docs[0].id, "a");
        assert_eq!(snapshot.docs[1].id, "b");
    }

    #[test]
    fn test_listener_registration_runs_unsubscribe_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let registration = ListenerRegistration::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        registration.remove();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        ListenerRegistration::noop().remove();
    }
}
