//! # Backup Service
//!
//! Exports every domain collection into one JSON document and restores from
//! such a document. Import replaces each collection present in the backup
//! with a single store write; collections missing from it are left alone.
//! Account records (`users`) are never part of a backup.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{info, warn};
use serde_json::Value;
use shared::{BackupDocument, BackupImportResponse};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::backend::config::expand_home;
use crate::backend::domain::customer_service::CUSTOMERS_COLLECTION;
use crate::backend::domain::data_service::DataService;
use crate::backend::domain::invoice_service::INVOICES_COLLECTION;
use crate::backend::domain::order_service::ORDERS_COLLECTION;
use crate::backend::domain::submission_service::SUBMISSIONS_COLLECTION;
use crate::backend::storage::document::Query;
use crate::backend::storage::traits::Record;

pub const BACKUP_VERSION: &str = "1.0";

/// Collections included in a backup, in export order
pub const BACKUP_COLLECTIONS: &[&str] =
    &[ORDERS_COLLECTION, CUSTOMERS_COLLECTION, INVOICES_COLLECTION, SUBMISSIONS_COLLECTION];

#[derive(Clone)]
pub struct BackupService {
    data: DataService,
}

impl BackupService {
    pub fn new(data: DataService) -> Self {
        Self { data }
    }

    /// Snapshot every known collection
    pub async fn export(&self) -> Result<BackupDocument> {
        info!("💾 BACKUP: Exporting {} collections", BACKUP_COLLECTIONS.len());

        let mut collections = BTreeMap::new();
        for name in BACKUP_COLLECTIONS {
            // Read the store directly so a stale cache never ends up in a backup
            let records = self
                .data
                .database()
                .store()
                .run_query(&Query::new(*name))
                .await
                .with_context(|| format!("Failed to read '{}' for backup", name))?
                .into_records();
            info!("💾 BACKUP: {} records from '{}'", records.len(), name);
            collections.insert(name.to_string(), records.into_iter().map(Value::Object).collect());
        }

        Ok(BackupDocument { version: BACKUP_VERSION.to_string(), created_at: Utc::now().to_rfc3339(), collections })
    }

    /// Write a backup to `dir` (with `~` expanded) and return the file path
    pub async fn export_to_file(&self, dir: &Path) -> Result<PathBuf> {
        let dir = expand_home(dir);
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let document = self.export().await?;
        let filename = format!("jersey-orders-backup-{}.json", Utc::now().format("%Y%m%d-%H%M%S"));
        let path = dir.join(filename);
        let json = serde_json::to_string_pretty(&document)?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;

        info!("✅ BACKUP: Written to {}", path.display());
        Ok(path)
    }

    /// Replace collections with the contents of a backup
    pub async fn import(&self, document: BackupDocument) -> Result<BackupImportResponse> {
        if document.version != BACKUP_VERSION {
            bail!("Unsupported backup version '{}' (expected {})", document.version, BACKUP_VERSION);
        }

        // Check everything before touching the store
        let mut restores: Vec<(String, Vec<Record>)> = Vec::new();
        for (name, records) in document.collections {
            if !BACKUP_COLLECTIONS.contains(&name.as_str()) {
                warn!("💾 RESTORE: Skipping unknown collection '{}'", name);
                continue;
            }
            let mut checked = Vec::with_capacity(records.len());
            for (index, record) in records.into_iter().enumerate() {
                let has_id = record.get("id").and_then(Value::as_str).is_some_and(|id| !id.is_empty());
                match record {
                    Value::Object(record) if has_id => checked.push(record),
                    _ => bail!("Backup record {} in '{}' is not an object with an id", index, name),
                }
            }
            restores.push((name, checked));
        }

        // Each collection is swapped in a single write, so a failure leaves it untouched
        let mut restored_collections = 0;
        let mut restored_records = 0;
        for (name, records) in restores {
            let count = records.len();
            self.data
                .replace_collection(&name, records)
                .await
                .with_context(|| format!("Restore stopped at '{}'", name))?;
            restored_collections += 1;
            restored_records += count;
            info!("💾 RESTORE: Replaced '{}' ({} records)", name, count);
        }

        Ok(BackupImportResponse {
            restored_collections,
            restored_records,
            success_message: format!(
                "Restored {} records across {} collections",
                restored_records, restored_collections
            ),
        })
    }

    pub async fn import_from_file(&self, path: &Path) -> Result<BackupImportResponse> {
        let path = expand_home(path);
        let json = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let document: BackupDocument =
            serde_json::from_str(&json).with_context(|| format!("{} is not a backup file", path.display()))?;
        self.import(document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::domain::order_service::tests::{sample_request, setup_data_service};
    use crate::backend::clock::system_clock;
    use crate::backend::domain::order_service::OrderService;
    use crate::backend::storage::cache::CacheManager;
    use crate::backend::storage::document::Database;
    use crate::backend::storage::kv::MemoryStorage;
    use crate::backend::storage::local::LocalDocumentStore;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use shared::ListQuery;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_export_includes_every_collection() {
        let data = setup_data_service();
        let orders = OrderService::new(data.clone());
        let order = orders.create_order(sample_request()).await.unwrap().order;

        let backup = BackupService::new(data).export().await.unwrap();
        assert_eq!(backup.version, BACKUP_VERSION);
        assert_eq!(backup.collections.len(), BACKUP_COLLECTIONS.len());
        assert_eq!(backup.collections["orders"].len(), 1);
        assert_eq!(backup.collections["orders"][0]["id"], order.id.as_str());
        assert!(backup.collections["customers"].is_empty());
    }

    #[tokio::test]
    async fn test_import_replaces_collections() {
        let data = setup_data_service();
        let orders = OrderService::new(data.clone());
        let service = BackupService::new(data.clone());

        orders.create_order(sample_request()).await.unwrap();
        let backup = service.export().await.unwrap();

        // Two more orders after the backup
        orders.create_order(sample_request()).await.unwrap();
        orders.create_order(sample_request()).await.unwrap();
        assert_eq!(orders.list_orders(&ListQuery::default()).await.unwrap().orders.len(), 3);

        let response = service.import(backup).await.unwrap();
        assert_eq!(response.restored_collections, BACKUP_COLLECTIONS.len());
        assert_eq!(response.restored_records, 1);
        assert_eq!(orders.list_orders(&ListQuery::default()).await.unwrap().orders.len(), 1);
    }

    #[tokio::test]
    async fn test_import_rejects_bad_documents() {
        let service = BackupService::new(setup_data_service());

        let mut wrong_version =
            BackupDocument { version: "0.1".to_string(), created_at: String::new(), collections: BTreeMap::new() };
        assert!(service.import(wrong_version.clone()).await.is_err());

        wrong_version.version = BACKUP_VERSION.to_string();
        wrong_version.collections.insert("orders".to_string(), vec![json!({"quantity": 1})]);
        let err = service.import(wrong_version).await.unwrap_err();
        assert!(err.to_string().contains("not an object with an id"));
    }

    #[tokio::test]
    async fn test_failed_import_keeps_original_records() {
        // Documents live in a small store; the cache gets its own
        let documents = Arc::new(MemoryStorage::with_quota(512));
        let store = LocalDocumentStore::new(documents);
        let cache = Arc::new(CacheManager::new(Arc::new(MemoryStorage::new()), system_clock()));
        let data = DataService::new(Database::new(Arc::new(store)), cache, Duration::from_secs(300));
        let service = BackupService::new(data.clone());

        let mut original = Record::new();
        original.insert("id".to_string(), json!("ORD-1"));
        original.insert("customerName".to_string(), json!("Jamie Rivera"));
        data.save("orders", original).await.unwrap();

        let mut backup = BackupDocument {
            version: BACKUP_VERSION.to_string(),
            created_at: String::new(),
            collections: BTreeMap::new(),
        };
        backup.collections.insert(
            "orders".to_string(),
            vec![json!({ "id": "ORD-2" }), json!({ "id": "ORD-3", "notes": "x".repeat(2048) })],
        );

        let err = service.import(backup).await.unwrap_err();
        assert!(format!("{:#}", err).contains("orders"));

        let kept = data.get("orders", "ORD-1").await.unwrap().unwrap();
        assert_eq!(kept["customerName"], "Jamie Rivera");
        assert!(data.get("orders", "ORD-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let data = setup_data_service();
        let orders = OrderService::new(data.clone());
        let service = BackupService::new(data);
        orders.create_order(sample_request()).await.unwrap();

        let path = service.export_to_file(temp_dir.path()).await.unwrap();
        assert!(path.exists());
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("jersey-orders-backup-"));

        let response = service.import_from_file(&path).await.unwrap();
        assert_eq!(response.restored_records, 1);
    }
}
