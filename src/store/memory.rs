//! # In-Memory Store
//!
//! Table held in a shared `BTreeMap` so iteration order is stable.
//! A byte quota can be armed to exercise the quota-recovery path
//! without filling a real disk.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::contract::{IterateVisitor, KeyValueStore};
use super::errors::{StoreError, StoreResult};

/// In-memory key-value table
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the total stored bytes; a save pushing past the cap fails
    /// with [`StoreError::QuotaExceeded`]
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Number of entries currently stored
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stored_bytes(entries: &BTreeMap<String, Vec<u8>>) -> u64 {
        entries.values().map(|v| v.len() as u64).sum()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;

        if let Some(quota) = self.quota_bytes {
            let existing = entries.get(key).map(|v| v.len() as u64).unwrap_or(0);
            let after = Self::stored_bytes(&entries) - existing + value.len() as u64;
            if after > quota {
                return Err(StoreError::QuotaExceeded);
            }
        }

        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }

    async fn iterate(&self, visit: IterateVisitor<'_>) -> StoreResult<()> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        for (key, value) in entries.iter() {
            visit(value, key);
        }
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        entries.clear();
        Ok(())
    }
}
