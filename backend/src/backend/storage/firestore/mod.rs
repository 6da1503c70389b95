//! # Firestore Document Store
//!
//! [`DocumentStore`] implementation over the Firestore REST API
//! (`projects/{project}/databases/{database}/documents`).
//!
//! - `get_document` maps HTTP 404 to a missing snapshot.
//! - `set_document` is a PATCH; merge writes send an `updateMask` naming the
//!   written fields so untouched fields survive.
//! - `delete_document` uses a `currentDocument.exists` precondition so the
//!   boolean result reports whether anything was removed.
//! - `run_query` posts a `structuredQuery` to `:runQuery`.
//! - `replace_collection` sends every delete and update in one `:commit`,
//!   which Firestore applies atomically.
//! - `on_snapshot` delivers one snapshot, like the local store.

pub mod values;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use shared::SortDirection;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::backend::storage::document::{
    DocumentSnapshot, ListenerRegistration, Query, QuerySnapshot, SetOptions, SnapshotCallback,
};
use crate::backend::storage::local::check_unique_ids;
use crate::backend::storage::traits::{DocumentStore, Record, StorageError};
use values::{decode_fields, encode_fields, field_path};

pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

/// Firestore caps a single commit at this many writes
const MAX_COMMIT_WRITES: usize = 500;

/// Connection settings for a Firestore project
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub api_key: String,
    pub base_url: String,
    pub database: String,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_FIRESTORE_URL.to_string(),
            database: "(default)".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.database
        )
    }
}

/// Firestore-backed document store
#[derive(Clone)]
pub struct FirestoreStore {
    client: Client,
    config: FirestoreConfig,
    id_token: Arc<RwLock<Option<String>>>,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Self {
        info!(
            "Firestore store configured for project '{}' at {}",
            config.project_id, config.base_url
        );
        Self {
            client: Client::new(),
            config,
            id_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Attach (or clear) the signed-in user's ID token for subsequent requests
    pub fn set_id_token(&self, token: Option<String>) {
        let mut guard = self.id_token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = token;
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    /// Resource name used inside batch writes
    fn document_name(&self, collection: &str, id: &str) -> String {
        format!(
            "projects/{}/databases/{}/documents/{}/{}",
            self.config.project_id, self.config.database, collection, id
        )
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.config.documents_root(), collection, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.query(&[("key", self.config.api_key.as_str())]);
        let token = self.id_token.read().unwrap_or_else(PoisonError::into_inner).clone();
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Response, StorageError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("{} request failed: {}", operation, e)))
    }

    async fn read_json(operation: &str, response: Response) -> Result<Value, StorageError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Backend(format!(
                "{} returned {}: {}",
                operation,
                status,
                body.trim()
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| StorageError::Backend(format!("{} returned invalid JSON: {}", operation, e)))
    }

    fn structured_query(query: &Query) -> Value {
        let mut structured = json!({
            "from": [{ "collectionId": query.collection }]
        });
        if let Some((field, direction)) = &query.order_by {
            let direction = match direction {
                SortDirection::Asc => "ASCENDING",
                SortDirection::Desc => "DESCENDING",
            };
            structured["orderBy"] = json!([{
                "field": { "fieldPath": field_path(field) },
                "direction": direction
            }]);
        }
        if let Some(limit) = query.limit {
            structured["limit"] = json!(limit);
        }
        json!({ "structuredQuery": structured })
    }
}

/// Convert a Firestore document resource into a record carrying its `id`
fn document_to_record(document: &Value) -> Option<Record> {
    let name = document.get("name")?.as_str()?;
    let id = name.rsplit('/').next()?.to_string();
    let mut record = document.get("fields").map(decode_fields).unwrap_or_default();
    record.entry("id").or_insert(Value::String(id));
    Some(record)
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn backend_name(&self) -> &'static str {
        "firestore"
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<DocumentSnapshot, StorageError> {
        let url = self.document_url(collection, id);
        let response = self.send("get", self.client.get(&url)).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Firestore document {}/{} not found", collection, id);
            return Ok(DocumentSnapshot::missing(id));
        }

        let document = Self::read_json("get", response).await?;
        match document_to_record(&document) {
            Some(record) => Ok(DocumentSnapshot::found(id, record)),
            None => Err(StorageError::Backend(format!(
                "get returned a document without a name for {}/{}",
                collection, id
            ))),
        }
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        mut data: Record,
        options: SetOptions,
    ) -> Result<(), StorageError> {
        data.insert("id".to_string(), Value::String(id.to_string()));

        let url = self.document_url(collection, id);
        let mut request = self.client.patch(&url);
        if options.merge {
            let mask: Vec<(&str, String)> = data
                .keys()
                .map(|name| ("updateMask.fieldPaths", field_path(name)))
                .collect();
            request = request.query(&mask);
        }

        let body = json!({ "fields": encode_fields(&data) });
        let response = self.send("set", request.json(&body)).await?;
        Self::read_json("set", response).await?;

        debug!(
            "Firestore wrote {}/{} ({} fields, merge={})",
            collection,
            id,
            data.len(),
            options.merge
        );
        Ok(())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<bool, StorageError> {
        let url = self.document_url(collection, id);
        let request = self
            .client
            .delete(&url)
            .query(&[("currentDocument.exists", "true")]);
        let response = self.send("delete", request).await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::read_json("delete", response).await?;
        Ok(true)
    }

    async fn replace_collection(&self, collection: &str, records: Vec<Record>) -> Result<(), StorageError> {
        check_unique_ids(collection, &records)?;

        let existing = self.run_query(&Query::new(collection)).await?.into_records();
        let keep: HashSet<&str> = records
            .iter()
            .filter_map(|record| record.get("id").and_then(Value::as_str))
            .collect();

        let mut writes: Vec<Value> = existing
            .iter()
            .filter_map(|record| record.get("id").and_then(Value::as_str))
            .filter(|id| !keep.contains(id))
            .map(|id| json!({ "delete": self.document_name(collection, id) }))
            .collect();
        for record in &records {
            let id = record.get("id").and_then(Value::as_str).unwrap_or_default();
            writes.push(json!({
                "update": {
                    "name": self.document_name(collection, id),
                    "fields": encode_fields(record)
                }
            }));
        }

        if writes.len() > MAX_COMMIT_WRITES {
            return Err(StorageError::InvalidArgument(format!(
                "replacing '{}' needs {} writes; a commit allows {}",
                collection,
                writes.len(),
                MAX_COMMIT_WRITES
            )));
        }
        if writes.is_empty() {
            return Ok(());
        }

        // One commit applies every write or none
        let url = format!("{}:commit", self.config.documents_root());
        let count = writes.len();
        let response = self
            .send("commit", self.client.post(&url).json(&json!({ "writes": writes })))
            .await?;
        Self::read_json("commit", response).await?;

        debug!("Firestore replaced '{}' ({} writes)", collection, count);
        Ok(())
    }

    async fn run_query(&self, query: &Query) -> Result<QuerySnapshot, StorageError> {
        let url = format!("{}:runQuery", self.config.documents_root());
        let body = Self::structured_query(query);
        let response = self.send("query", self.client.post(&url).json(&body)).await?;
        let results = Self::read_json("query", response).await?;

        let Value::Array(rows) = results else {
            warn!("Firestore query on '{}' returned a non-array body", query.collection);
            return Ok(QuerySnapshot::default());
        };

        // Rows without a `document` only carry read metadata
        let records: Vec<Record> = rows
            .iter()
            .filter_map(|row| row.get("document"))
            .filter_map(document_to_record)
            .collect();

        Ok(QuerySnapshot::from_records(records))
    }

    async fn on_snapshot(
        &self,
        query: &Query,
        callback: SnapshotCallback,
    ) -> Result<ListenerRegistration, StorageError> {
        let snapshot = self.run_query(query).await?;
        callback(snapshot);
        Ok(ListenerRegistration::noop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_query_shape() {
        let mut query = Query::new("orders");
        query.order_by = Some(("createdAt".to_string(), SortDirection::Desc));
        query.limit = Some(10);

        let body = FirestoreStore::structured_query(&query);
        assert_eq!(
            body,
            json!({"structuredQuery": {
                "from": [{"collectionId": "orders"}],
                "orderBy": [{"field": {"fieldPath": "createdAt"}, "direction": "DESCENDING"}],
                "limit": 10
            }})
        );
    }

    #[test]
    fn test_document_to_record_uses_name_suffix_as_id() {
        let document = json!({
            "name": "projects/p/databases/(default)/documents/orders/ORD-1",
            "fields": {"quantity": {"integerValue": "2"}}
        });
        let record = document_to_record(&document).unwrap();
        assert_eq!(record.get("id"), Some(&json!("ORD-1")));
        assert_eq!(record.get("quantity"), Some(&json!(2)));
    }

    #[test]
    fn test_documents_root_trims_trailing_slash() {
        let config = FirestoreConfig::new("demo", "key").with_base_url("http://localhost:8080/v1/");
        assert_eq!(
            config.documents_root(),
            "http://localhost:8080/v1/projects/demo/databases/(default)/documents"
        );
    }
}
