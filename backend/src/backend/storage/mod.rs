//! # Storage Layer
//!
//! Data persistence for the jersey order backend.
//!
//! ## Layers
//!
//! - **kv**: flat key/value stores (`MemoryStorage`, `FileStorage`) standing in
//!   for the browser `localStorage`
//! - **local**: the document-store shim, one JSON array per collection on top
//!   of a key/value store
//! - **firestore**: the same document surface over the Firestore REST API
//! - **cache**: two-tier TTL cache used by the data service
//! - **document**: snapshot/query types and the fluent `Database` wrapper
//!
//! Domain services only see [`DocumentStore`] and [`KeyValueStorage`]; which
//! document backend runs is decided once at startup from configuration.

pub mod cache;
pub mod document;
pub mod firestore;
pub mod kv;
pub mod local;
pub mod traits;

pub use cache::{CacheEntry, CacheManager, CacheStats};
pub use document::{
    CollectionRef, Database, DocumentRef, DocumentSnapshot, ListenerRegistration, Query, QueryRef, QuerySnapshot,
    SetOptions, SnapshotCallback,
};
pub use firestore::{FirestoreConfig, FirestoreStore};
pub use kv::{FileStorage, MemoryStorage};
pub use local::LocalDocumentStore;
pub use traits::{DocumentStore, KeyValueStorage, Record, StorageError};
