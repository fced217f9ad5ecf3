/// Byte-level document stores.
pub mod kv_store;
/// Persisted document layouts.
pub mod models;
/// Conversion between the driver and its stored documents.
pub mod snapshot;
/// Storage error types.
pub mod storage;
