//! In-memory object store.
//!
//! Backs tests and local experimentation. A `BTreeMap` keeps keys in
//! lexicographic order so listings match what a real bucket returns.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{BoxFuture, ObjectStore, StorageError};

#[derive(Clone, Debug)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// Object store holding everything in process memory.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// The stored content type of an object, if present.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .get(key)
            .map(|o| o.content_type.clone())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn list(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<String>, StorageError>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            let objects = self.objects.lock();
            Ok(objects
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(key, _)| key.clone())
                .collect())
        })
    }

    fn get(&self, key: &str) -> BoxFuture<'_, Result<Vec<u8>, StorageError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.objects
                .lock()
                .get(&key)
                .map(|o| o.data.clone())
                .ok_or(StorageError::NotFound(key))
        })
    }

    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BoxFuture<'_, Result<(), StorageError>> {
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            self.objects.lock().insert(
                key,
                StoredObject {
                    data: bytes,
                    content_type,
                },
            );
            Ok(())
        })
    }

    fn copy(&self, from: &str, to: &str) -> BoxFuture<'_, Result<(), StorageError>> {
        let from = from.to_string();
        let to = to.to_string();
        Box::pin(async move {
            let mut objects = self.objects.lock();
            let object = objects
                .get(&from)
                .cloned()
                .ok_or(StorageError::NotFound(from))?;
            objects.insert(to, object);
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<(), StorageError>> {
        let key = key.to_string();
        Box::pin(async move {
            self.objects.lock().remove(&key);
            Ok(())
        })
    }
}
