//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer.
//!
//! Two seams exist:
//! - [`KeyValueStorage`]: the flat string key/value surface ("localStorage")
//!   that the local data shim, the cache's durable tier, the session record and
//!   the Zoho token store all sit on.
//! - [`DocumentStore`]: the minimal document-database surface
//!   (get/set/delete/replace/query/on_snapshot) implemented both by the local shim and
//!   by the hosted Firestore backend.

use async_trait::async_trait;
use thiserror::Error;

use super::document::{DocumentSnapshot, ListenerRegistration, Query, QuerySnapshot, SetOptions, SnapshotCallback};

/// A schemaless JSON document
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Errors raised by storage backends
///
/// "Not found" is never an error; absent documents and collections come back
/// as empty results.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded while writing '{key}' ({needed} bytes needed, {available} available)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("backend request failed: {0}")]
    Backend(String),
}

/// Trait defining the interface for flat key/value storage
///
/// Mirrors the browser `localStorage` contract: synchronous, string values,
/// last write wins.
pub trait KeyValueStorage: Send + Sync {
    /// Read a value; `Ok(None)` when the key is absent
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key; removing an absent key is not an error
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// List every stored key
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Remove every key
    fn clear(&self) -> Result<(), StorageError>;
}

/// Trait defining the interface for document storage operations
///
/// Implemented by the local shim and by the hosted Firestore client so that
/// domain services run identically against either. Use
/// [`Database`](super::document::Database) for the fluent
/// `collection(..).doc(..)` surface on top of this trait.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logging ("local", "firestore")
    fn backend_name(&self) -> &'static str;

    /// Fetch one document; absent documents return `exists == false`
    async fn get_document(&self, collection: &str, id: &str) -> Result<DocumentSnapshot, StorageError>;

    /// Insert or replace a document, optionally shallow-merging onto existing fields
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        data: Record,
        options: SetOptions,
    ) -> Result<(), StorageError>;

    /// Delete a document; returns true if something was removed
    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StorageError>;

    /// Replace the whole collection with `records` in one write
    ///
    /// Every record must carry a unique, non-empty `id`. On failure the
    /// previous contents are left as they were.
    async fn replace_collection(&self, collection: &str, records: Vec<Record>) -> Result<(), StorageError>;

    /// Run a one-shot query (sorted and limited)
    async fn run_query(&self, query: &Query) -> Result<QuerySnapshot, StorageError>;

    /// Register a snapshot listener; the callback fires once immediately
    async fn on_snapshot(
        &self,
        query: &Query,
        callback: SnapshotCallback,
    ) -> Result<ListenerRegistration, StorageError>;
}
