//! # Store Contract
//!
//! The boundary the persistence core requires from its backing storage:
//! keyed load/save/delete plus full-table iteration. All operations are
//! asynchronous and may fail with a [`StoreError`]. There is no
//! transactional guarantee across keys; callers sequence dependent
//! writes explicitly.

use async_trait::async_trait;

use super::errors::StoreResult;

/// Visitor for [`KeyValueStore::iterate`], called once per entry
/// with `(value, key)`.
pub type IterateVisitor<'a> = &'a mut (dyn FnMut(&[u8], &str) + Send);

/// Backend trait for keyed persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Load the value stored under `key`, if any
    async fn load(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Save `value` under `key`, replacing any previous value
    async fn save(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Delete the entry under `key`; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Visit every entry in ascending key order
    async fn iterate(&self, visit: IterateVisitor<'_>) -> StoreResult<()>;

    /// Remove every entry in the table
    async fn clear(&self) -> StoreResult<()>;
}
