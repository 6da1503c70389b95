//! # Local Document Store
//!
//! Emulates the document-database query surface on top of a
//! [`KeyValueStorage`]. Each collection is one JSON array stored under a key
//! equal to the collection name.
//!
//! ## Behaviour
//!
//! - Reads never fail for absent data: a missing document is
//!   `exists == false`, a missing collection is empty (and is seeded as `[]`
//!   under the write lock, so a seed never overwrites a concurrent write).
//! - A collection whose stored JSON cannot be parsed is treated as empty and
//!   logged; the next write overwrites it.
//! - `set` replaces or appends by `id`, so ids stay unique per collection.
//! - `order_by` is a stable sort using loose value comparison (see
//!   [`compare`]); ties keep stored order.
//! - `on_snapshot` delivers exactly one snapshot, synchronously, and does not
//!   observe later writes. The listener stays in the registry until removed.

pub mod compare;
pub mod listeners;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use shared::SortDirection;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::backend::storage::document::{
    json_type_name, DocumentSnapshot, ListenerRegistration, Query, QuerySnapshot, SetOptions, SnapshotCallback,
};
use crate::backend::storage::traits::{DocumentStore, KeyValueStorage, Record, StorageError};
use compare::{loose_compare, stable_sort_by};
pub use listeners::ListenerRegistry;

/// Document store backed by a key/value store
#[derive(Clone)]
pub struct LocalDocumentStore {
    storage: Arc<dyn KeyValueStorage>,
    listeners: ListenerRegistry,
    write_lock: Arc<Mutex<()>>,
}

impl LocalDocumentStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            listeners: ListenerRegistry::new(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn listeners(&self) -> &ListenerRegistry {
        &self.listeners
    }

    /// Load every record of a collection in stored order
    ///
    /// A collection seen for the first time is seeded as `[]`.
    pub fn read_collection(&self, collection: &str) -> Result<Vec<Record>, StorageError> {
        require_name("collection", collection)?;

        match self.storage.get_item(collection)? {
            Some(raw) => Ok(parse_collection(collection, &raw)),
            None => {
                self.seed_collection(collection);
                Ok(Vec::new())
            }
        }
    }

    /// Records as stored; callers must hold `write_lock`
    fn read_locked(&self, collection: &str) -> Result<Vec<Record>, StorageError> {
        require_name("collection", collection)?;
        Ok(self
            .storage
            .get_item(collection)?
            .map(|raw| parse_collection(collection, &raw))
            .unwrap_or_default())
    }

    /// Write `[]` unless a writer got there first
    fn seed_collection(&self, collection: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.storage.get_item(collection) {
            Ok(None) => {
                if let Err(e) = self.storage.set_item(collection, "[]") {
                    warn!("Could not seed empty collection '{}': {}", collection, e);
                }
            }
            Ok(Some(_)) => {}
            Err(e) => warn!("Could not seed empty collection '{}': {}", collection, e),
        }
    }

    fn write_collection(&self, collection: &str, records: &[Record]) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(records)?;
        self.storage.set_item(collection, &serialized)
    }

    /// Apply ordering and limit from a query to a record list
    pub fn apply_query(records: Vec<Record>, query: &Query) -> Vec<Record> {
        let mut records = match &query.order_by {
            Some((field, direction)) => {
                let direction = *direction;
                stable_sort_by(records, |a, b| {
                    let ordering = loose_compare(a.get(field), b.get(field));
                    match direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    }
                })
            }
            None => records,
        };

        if let Some(limit) = query.limit {
            records.truncate(limit);
        }

        records
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<DocumentSnapshot, StorageError> {
        require_name("document id", id)?;
        let records = self.read_collection(collection)?;

        Ok(records
            .into_iter()
            .find(|record| record_id(record) == Some(id))
            .map(|record| DocumentSnapshot::found(id, record))
            .unwrap_or_else(|| DocumentSnapshot::missing(id)))
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: Record,
        options: SetOptions,
    ) -> Result<(), StorageError> {
        require_name("document id", id)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut records = self.read_locked(collection)?;
        let position = records.iter().position(|record| record_id(record) == Some(id));

        let mut record = match (position, options.merge) {
            (Some(index), true) => {
                let mut existing = records[index].clone();
                existing.extend(data);
                existing
            }
            _ => data,
        };
        record.insert("id".to_string(), Value::String(id.to_string()));

        match position {
            Some(index) => records[index] = record,
            None => records.push(record),
        }

        self.write_collection(collection, &records)?;
        debug!(
            "Saved '{}/{}' (merge: {}, collection size: {})",
            collection,
            id,
            options.merge,
            records.len()
        );
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        require_name("document id", id)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut records = self.read_locked(collection)?;
        let before = records.len();
        records.retain(|record| record_id(record) != Some(id));

        if records.len() == before {
            return Ok(false);
        }

        self.write_collection(collection, &records)?;
        debug!("Deleted '{}/{}'", collection, id);
        Ok(true)
    }

    async fn replace_collection(&self, collection: &str, records: Vec<Record>) -> Result<(), StorageError> {
        require_name("collection", collection)?;
        check_unique_ids(collection, &records)?;
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.write_collection(collection, &records)?;
        debug!("Replaced '{}' with {} records", collection, records.len());
        Ok(())
    }

    async fn run_query(&self, query: &Query) -> Result<QuerySnapshot, StorageError> {
        let records = self.read_collection(&query.collection)?;
        Ok(QuerySnapshot::from_records(Self::apply_query(records, query)))
    }

    async fn on_snapshot(
        &self,
        query: &Query,
        callback: SnapshotCallback,
    ) -> Result<ListenerRegistration, StorageError> {
        let snapshot = self.run_query(query).await?;
        let listener_id = self.listeners.register(query);

        callback(snapshot);

        let registry = self.listeners.clone();
        let collection = query.collection.clone();
        Ok(ListenerRegistration::new(move || {
            registry.unregister(&collection, listener_id);
        }))
    }
}

fn parse_collection(collection: &str, raw: &str) -> Vec<Record> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => {
            let total = items.len();
            let records: Vec<Record> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect();
            if records.len() != total {
                warn!(
                    "Collection '{}' contained {} non-object entries; they were skipped",
                    collection,
                    total - records.len()
                );
            }
            records
        }
        Ok(other) => {
            warn!(
                "Collection '{}' holds a JSON {} instead of an array; treating it as empty",
                collection,
                json_type_name(&other)
            );
            Vec::new()
        }
        Err(e) => {
            warn!("Collection '{}' is corrupted ({}); treating it as empty", collection, e);
            Vec::new()
        }
    }
}

fn record_id(record: &Record) -> Option<&str> {
    record.get("id").and_then(|v| v.as_str())
}

/// Every record needs a non-empty id, and no id may repeat
pub(crate) fn check_unique_ids(collection: &str, records: &[Record]) -> Result<(), StorageError> {
    let mut seen = HashSet::new();
    for (index, record) in records.iter().enumerate() {
        let id = record_id(record).filter(|id| !id.trim().is_empty()).ok_or_else(|| {
            StorageError::InvalidArgument(format!("record {} for '{}' has no id", index, collection))
        })?;
        if !seen.insert(id) {
            return Err(StorageError::InvalidArgument(format!(
                "duplicate id '{}' in records for '{}'",
                id, collection
            )));
        }
    }
    Ok(())
}

fn require_name(kind: &str, value: &str) -> Result<(), StorageError> {
    if value.trim().is_empty() {
        return Err(StorageError::InvalidArgument(format!("{} must not be empty", kind)));
    }
    Ok(())
}
