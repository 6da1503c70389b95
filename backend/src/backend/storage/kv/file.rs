use log::{debug, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::quota_check;
use crate::backend::storage::traits::{KeyValueStorage, StorageError};

const ITEM_EXTENSION: &str = "json";

/// FileStorage keeps one file per key inside a data directory
///
/// Keys are percent-encoded into file names so that `keys()` can recover the
/// original key. Writes go through a temp file and a rename.
#[derive(Clone)]
pub struct FileStorage {
    base_directory: PathBuf,
    write_lock: Arc<Mutex<()>>,
    quota_bytes: Option<usize>,
}

impl FileStorage {
    /// Create a file store rooted at `base_directory`, creating it if needed
    pub fn new<P: AsRef<Path>>(base_directory: P) -> Result<Self, StorageError> {
        let base_path = base_directory.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
            info!("Created data directory: {}", base_path.display());
        }

        Ok(Self {
            base_directory: base_path,
            write_lock: Arc::new(Mutex::new(())),
            quota_bytes: None,
        })
    }

    /// Limit the total size of stored values
    pub fn with_quota(mut self, quota_bytes: usize) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Get the file path holding a key
    pub fn item_path(&self, key: &str) -> PathBuf {
        self.base_directory
            .join(format!("{}.{}", encode_key(key), ITEM_EXTENSION))
    }

    fn used_bytes_excluding(&self, key: &str) -> Result<usize, StorageError> {
        let mut used = 0;
        for stored_key in self.keys()? {
            if stored_key == key {
                continue;
            }
            let len = fs::metadata(self.item_path(&stored_key)).map(|m| m.len() as usize).unwrap_or(0);
            used += stored_key.len() + len;
        }
        Ok(used)
    }
}

impl KeyValueStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.item_path(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(quota) = self.quota_bytes {
            let used = self.used_bytes_excluding(key)?;
            quota_check(key, key.len() + value.len(), used, quota)?;
        }

        let path = self.item_path(key);

        // Atomic write using temp file
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, value)?;
        fs::rename(&temp_path, &path)?;

        debug!("Wrote {} bytes to '{}'", value.len(), key);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();

        for entry in fs::read_dir(&self.base_directory)? {
            let path = entry?.path();

            if path.extension().and_then(|e| e.to_str()) != Some(ITEM_EXTENSION) {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping file with invalid name: {:?}", path);
                continue;
            };

            match decode_key(stem) {
                Some(key) => keys.push(key),
                None => warn!("Skipping file with undecodable key: {:?}", path),
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn clear(&self) -> Result<(), StorageError> {
        for key in self.keys()? {
            self.remove_item(&key)?;
        }
        Ok(())
    }
}

/// Percent-encode everything except ASCII alphanumerics, '-' and '_'
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}
