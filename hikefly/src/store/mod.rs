//! Object store abstraction
//!
//! The pipeline reads uploads and writes scoring artifacts through this
//! trait; any backend implementing it suffices. The interface is
//! intentionally minimal:
//!
//! - **String keys**: `/`-separated, human-readable in logs
//! - **`Vec<u8>` values**: raw bytes, no serialization opinions imposed
//! - **Dyn-compatible**: async methods return `Pin<Box<dyn Future>>` so
//!   the pipeline can hold an `Arc<dyn ObjectStore>`
//!
//! `move_object` is copy-then-delete and deliberately not atomic: a crash
//! between the two steps leaves the object in both places, which the
//! pipeline absorbs through flight-id deduplication.

mod fs;
mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors from object-store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested key does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// I/O error from the backing storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A key the backend cannot represent.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Minimal object-store interface consumed by the pipeline.
///
/// Every operation is independently retryable and idempotent except
/// `move_object`, which is idempotent only in combination with the
/// pipeline's downstream flight-id dedup.
pub trait ObjectStore: Send + Sync {
    /// Lists all keys starting with `prefix`, in lexicographic order.
    fn list(&self, prefix: &str) -> BoxFuture<'_, Result<Vec<String>, StorageError>>;

    /// Reads an object, failing with [`StorageError::NotFound`] if absent.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Vec<u8>, StorageError>>;

    /// Writes an object, replacing any existing one.
    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Copies an object to a new key, leaving the source in place.
    fn copy(&self, from: &str, to: &str) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Deletes an object. Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<(), StorageError>>;

    /// Moves an object: copy, then delete the source.
    ///
    /// Not atomic. If the delete fails the object exists under both keys
    /// until the next successful move.
    fn move_object(&self, from: &str, to: &str) -> BoxFuture<'_, Result<(), StorageError>> {
        let from = from.to_string();
        let to = to.to_string();
        Box::pin(async move {
            self.copy(&from, &to).await?;
            self.delete(&from).await
        })
    }
}
