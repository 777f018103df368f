//! In-memory object store used by tests and by dry-run plumbing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::object_store::ObjectStoreClient;

/// Object store keeping everything in a process-local map.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().expect("object map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored bytes for a key, if present.
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .expect("object map poisoned")
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Drop an object behind the replicator's back; test helper for
    /// missing-object paths.
    pub fn evict(&self, bucket: &str, key: &str) {
        self.objects
            .lock()
            .expect("object map poisoned")
            .remove(&(bucket.to_string(), key.to_string()));
    }
}

#[async_trait]
impl ObjectStoreClient for InMemoryObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: &Path) -> crate::Result<()> {
        let bytes = std::fs::read(body)?;
        self.objects
            .lock()
            .expect("object map poisoned")
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> crate::Result<()> {
        self.objects
            .lock()
            .expect("object map poisoned")
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> crate::Result<bool> {
        Ok(self
            .objects
            .lock()
            .expect("object map poisoned")
            .contains_key(&(bucket.to_string(), key.to_string())))
    }
}
