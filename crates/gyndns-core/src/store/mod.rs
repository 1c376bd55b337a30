//! Record store adapter
//!
//! Maps hostnames onto keys of a [`KeyValueStore`] and parses the stored
//! text back into addresses. Both front-ends go through [`RecordStore`], so
//! the update path and the query path always agree on key normalization.
//!
//! Key scheme: `"hostname/" + lowercase(fully-qualified hostname)`, value is
//! the textual IP address.

pub mod file;
pub mod memory;
pub mod redis;

use std::net::IpAddr;
use std::sync::Arc;

use tracing::error;

use crate::error::{Error, Result};
use crate::traits::KeyValueStore;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;
pub use self::redis::RedisKvStore;

/// Key prefix for address records
pub const KEY_PREFIX: &str = "hostname/";

/// Build the store key for a hostname
pub fn record_key(hostname: &str) -> String {
    format!("{}{}", KEY_PREFIX, hostname.to_ascii_lowercase())
}

/// Append the root label if `hostname` does not already end with one
pub fn fully_qualified(hostname: &str) -> String {
    if hostname.ends_with('.') {
        hostname.to_string()
    } else {
        format!("{}.", hostname)
    }
}

/// Address records on top of a key-value backend
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn KeyValueStore>,
}

impl RecordStore {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Current address of `hostname`
    ///
    /// Fails with [`Error::NotFound`] when nothing was published and with
    /// [`Error::StoreUnavailable`] when the backend fails or holds a value
    /// that is not an address.
    pub async fn get(&self, hostname: &str) -> Result<IpAddr> {
        let key = record_key(&fully_qualified(hostname));
        let value = self
            .backend
            .get(&key)
            .await
            .map_err(|e| unavailable(&key, e))?
            .ok_or_else(|| Error::NotFound(hostname.to_string()))?;

        value.trim().parse().map_err(|_| {
            error!(key = %key, value = %value, "stored value is not an IP address");
            Error::store(format!("invalid address stored under {}", key))
        })
    }

    /// Replace the address of `hostname`
    pub async fn set(&self, hostname: &str, address: IpAddr) -> Result<()> {
        let key = record_key(&fully_qualified(hostname));
        self.backend
            .set(&key, &address.to_string())
            .await
            .map_err(|e| unavailable(&key, e))
    }

    /// Persist pending backend changes
    pub async fn flush(&self) -> Result<()> {
        self.backend.flush().await.map_err(|e| unavailable("*", e))
    }
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}

fn unavailable(key: &str, err: Error) -> Error {
    error!(key = %key, error = %err, "record store failure");
    match err {
        Error::StoreUnavailable(_) => err,
        other => Error::store(other.to_string()),
    }
}
