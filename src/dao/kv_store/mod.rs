//! Whole-document key-value persistence.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;

/// Abstraction over the place JSON snapshots are kept.
///
/// Documents are opaque byte blobs addressed by a short key (`data`,
/// `ungraded`, ...). A key that was never saved loads as `None`.
pub trait KeyValueStore: Send + Sync {
    /// Fetch the bytes stored under `key`.
    fn load(&self, key: &str) -> BoxFuture<'static, StorageResult<Option<Vec<u8>>>>;
    /// Replace the bytes stored under `key`.
    fn save(&self, key: &str, bytes: Vec<u8>) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap liveness check used by the health endpoint.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
