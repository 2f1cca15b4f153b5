use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Relation, SnapshotCache};
use crate::error::CacheError;

/// Process-local snapshot cache.
#[derive(Debug, Default)]
pub struct MemorySnapshotCache {
    entries: Mutex<HashMap<Relation, Vec<u8>>>,
}

impl MemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Relation, Vec<u8>>> {
        // A panic while holding the lock cannot leave a half-written entry
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[async_trait]
impl SnapshotCache for MemorySnapshotCache {
    async fn get(&self, key: Relation) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries().get(&key).cloned())
    }

    async fn put(&self, key: Relation, value: Vec<u8>) -> Result<(), CacheError> {
        self.entries().insert(key, value);
        Ok(())
    }

    async fn available(&self) -> bool {
        true
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
