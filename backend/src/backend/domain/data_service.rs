//! # Data Service
//!
//! Single entry point the domain services use to read and write documents.
//! Reads go through the [`CacheManager`]; every write through this service
//! invalidates the cached queries of the collection it touched.
//!
//! The underlying [`DocumentStore`](crate::backend::storage::DocumentStore)
//! is whichever backend was configured at startup.

use anyhow::{Context, Result};
use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use shared::{ListQuery, SortDirection};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::storage::cache::CacheManager;
use crate::backend::storage::document::{Database, ListenerRegistration, Query, QuerySnapshot, SetOptions};
use crate::backend::storage::traits::Record;

#[derive(Clone)]
pub struct DataService {
    db: Database,
    cache: Arc<CacheManager>,
    ttl: Duration,
}

impl DataService {
    pub fn new(db: Database, cache: Arc<CacheManager>, ttl: Duration) -> Self {
        Self { db, cache, ttl }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    pub fn backend_name(&self) -> &'static str {
        self.db.store().backend_name()
    }

    /// Build a store query from list parameters, falling back to `default_order`
    pub fn list_query(collection: &str, params: &ListQuery, default_order: (&str, SortDirection)) -> Query {
        let mut query = Query::new(collection);
        let field = params
            .order_by
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(default_order.0);
        let direction = match params.order_by {
            Some(_) => params.direction.unwrap_or_default(),
            None => params.direction.unwrap_or(default_order.1),
        };
        query.order_by = Some((field.to_string(), direction));
        query.limit = params.limit.map(|n| n as usize);
        query
    }

    /// Cache key for a query
    pub fn query_key(query: &Query) -> String {
        let mut options = Map::new();
        if let Some((field, direction)) = &query.order_by {
            options.insert("orderBy".to_string(), Value::String(field.clone()));
            let direction = match direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            options.insert("direction".to_string(), Value::String(direction.to_string()));
        }
        if let Some(limit) = query.limit {
            options.insert("limit".to_string(), Value::from(limit));
        }
        CacheManager::generate_key(&query.collection, &options)
    }

    fn document_key(collection: &str, id: &str) -> String {
        let mut options = Map::new();
        options.insert("id".to_string(), Value::String(id.to_string()));
        CacheManager::generate_key(collection, &options)
    }

    fn cached_records(&self, key: &str) -> Option<Vec<Record>> {
        match self.cache.get(key)? {
            Value::Array(items) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        Value::Object(record) => Some(record),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    fn fill(&self, key: &str, records: &[Record]) {
        let value = Value::Array(records.iter().cloned().map(Value::Object).collect());
        self.cache.set(key, value, self.ttl);
    }

    /// Deliver the query result to `callback` once, from cache when possible
    pub async fn subscribe<F>(&self, query: &Query, callback: F) -> Result<ListenerRegistration>
    where
        F: Fn(QuerySnapshot) + Send + Sync + 'static,
    {
        let key = Self::query_key(query);
        if let Some(records) = self.cached_records(&key) {
            debug!("Cache hit for subscription '{}'", key);
            callback(QuerySnapshot::from_records(records));
            return Ok(ListenerRegistration::noop());
        }

        let cache = self.cache.clone();
        let ttl = self.ttl;
        let registration = self
            .db
            .store()
            .on_snapshot(
                query,
                Arc::new(move |snapshot: QuerySnapshot| {
                    let value = Value::Array(snapshot.records().into_iter().map(Value::Object).collect());
                    cache.set(&key, value, ttl);
                    callback(snapshot);
                }),
            )
            .await
            .with_context(|| format!("Failed to subscribe to '{}'", query.collection))?;
        Ok(registration)
    }

    /// One-shot query, cached
    pub async fn load(&self, query: &Query) -> Result<Vec<Record>> {
        let key = Self::query_key(query);
        if let Some(records) = self.cached_records(&key) {
            debug!("Cache hit for '{}'", key);
            return Ok(records);
        }

        let snapshot = self
            .db
            .store()
            .run_query(query)
            .await
            .with_context(|| format!("Failed to load '{}'", query.collection))?;
        let records = snapshot.into_records();
        self.fill(&key, &records);
        Ok(records)
    }

    pub async fn load_as<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>> {
        self.load(query)
            .await?
            .into_iter()
            .map(|record| serde_json::from_value(Value::Object(record)).map_err(Into::into))
            .collect()
    }

    /// Fetch one document, cached
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>> {
        let key = Self::document_key(collection, id);
        if let Some(Value::Object(record)) = self.cache.get(&key) {
            return Ok(Some(record));
        }

        let snapshot = self
            .db
            .collection(collection)
            .doc(id)
            .get()
            .await
            .with_context(|| format!("Failed to read {}/{}", collection, id))?;
        if !snapshot.exists {
            return Ok(None);
        }

        let record = snapshot.into_data();
        self.cache.set(&key, Value::Object(record.clone()), self.ttl);
        Ok(Some(record))
    }

    pub async fn get_as<T: DeserializeOwned>(&self, collection: &str, id: &str) -> Result<Option<T>> {
        match self.get(collection, id).await? {
            Some(record) => Ok(Some(serde_json::from_value(Value::Object(record))?)),
            None => Ok(None),
        }
    }

    /// Write a record (replacing any previous version) and return its id
    ///
    /// A record without an `id` gets a generated one.
    pub async fn save(&self, collection: &str, record: Record) -> Result<String> {
        let id = self
            .db
            .collection(collection)
            .add(record)
            .await
            .with_context(|| format!("Failed to save to '{}'", collection))?;
        self.cache.invalidate_collection(collection);
        debug!("Saved {}/{}", collection, id);
        Ok(id)
    }

    pub async fn save_typed<T: Serialize>(&self, collection: &str, value: &T) -> Result<String> {
        match serde_json::to_value(value)? {
            Value::Object(record) => self.save(collection, record).await,
            _ => anyhow::bail!("records for '{}' must serialize to a JSON object", collection),
        }
    }

    /// Shallow-merge fields onto an existing document (or create it)
    pub async fn merge(&self, collection: &str, id: &str, fields: Record) -> Result<()> {
        self.db
            .collection(collection)
            .doc(id)
            .set(fields, SetOptions::merge())
            .await
            .with_context(|| format!("Failed to update {}/{}", collection, id))?;
        self.cache.invalidate_collection(collection);
        Ok(())
    }

    /// Replace a whole collection in one store write
    pub async fn replace_collection(&self, collection: &str, records: Vec<Record>) -> Result<()> {
        let count = records.len();
        self.db
            .collection(collection)
            .replace(records)
            .await
            .with_context(|| format!("Failed to replace '{}'", collection))?;
        self.cache.invalidate_collection(collection);
        debug!("Replaced {} with {} records", collection, count);
        Ok(())
    }

    /// Delete a document; returns whether it existed
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let removed = self
            .db
            .collection(collection)
            .doc(id)
            .delete()
            .await
            .with_context(|| format!("Failed to delete {}/{}", collection, id))?;
        self.cache.invalidate_collection(collection);
        Ok(removed)
    }
}
