use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;

use super::KeyValueStore;
use crate::dao::storage::StorageResult;

/// Process-local store, mostly for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw document currently stored under `key`.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).cloned()
    }

    /// Seed a document.
    pub fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.lock().insert(key.to_owned(), bytes.into());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        match self.documents.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn load(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<Vec<u8>>>> {
        let value = self.get(key);
        Box::pin(async move { Ok(value) })
    }

    fn save(&self, key: &str, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>> {
        self.insert(key, bytes);
        Box::pin(async { Ok(()) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
