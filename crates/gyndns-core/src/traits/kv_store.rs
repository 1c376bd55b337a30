// # Key-Value Store Trait
//
// The collaborator behind the record store: a flat string-to-string map.
//
// ## Purpose
//
// Front-ends never talk to a backend directly. They go through
// `RecordStore`, which owns key normalization, and `RecordStore` goes
// through this trait. Transport, pooling and reconnection belong to the
// implementation.
//
// ## Implementations
//
// - `MemoryKvStore`: process-local map behind a reader/writer lock
// - `FileKvStore`: JSON file with atomic writes and backup recovery

use async_trait::async_trait;

use crate::Error;

/// Trait for key-value store backends
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Concurrent writes to the same key resolve as last-write-wins.
///
/// # Errors
///
/// Backend failures are reported as [`Error::StoreUnavailable`]. A missing
/// key is not an error.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: The current value
    /// - `Ok(None)`: Nothing stored under this key
    /// - `Err(Error)`: Backend failure
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Replace the value stored under `key`
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Persist any pending changes
    ///
    /// Called once by the supervisor after both listeners have drained.
    async fn flush(&self) -> Result<(), Error>;
}
