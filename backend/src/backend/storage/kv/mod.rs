//! Key/value stores backing the "localStorage" surface.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::backend::storage::traits::StorageError;

fn quota_check(key: &str, needed: usize, used: usize, quota: usize) -> Result<(), StorageError> {
    let available = quota.saturating_sub(used);
    if needed > available {
        return Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            needed,
            available,
        });
    }
    Ok(())
}
