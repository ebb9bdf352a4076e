use super::{Result, Store};
use dashmap::DashMap;

/// Process-local store. Contents are lost when the store is dropped.
#[derive(Default)]
pub struct MemoryStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.blobs.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.blobs.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(key))
    }
}
