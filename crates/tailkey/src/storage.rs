//! Durable key-value storage seam.
//!
//! The host hands the backend a storage view at mount time. Entries are
//! opaque JSON blobs; reads and writes of a single key are atomic, with no
//! compare-and-swap, so concurrent writers race last-writer-wins.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by storage implementations and the entry codec.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage collaborator failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A value could not be serialized into an entry.
    #[error("failed to encode storage entry: {0}")]
    Encode(#[source] serde_json::Error),

    /// An entry exists but does not deserialize into the expected shape.
    #[error("failed to decode storage entry: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A single stored entry: a key and an opaque serialized value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Storage key the entry lives under.
    pub key: String,
    /// Serialized value.
    pub value: Vec<u8>,
}

impl StorageEntry {
    /// Build an entry by JSON-encoding a value.
    ///
    /// # Errors
    /// Returns [`StorageError::Encode`] if the value fails to serialize.
    pub fn json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self, StorageError> {
        let value = serde_json::to_vec(value).map_err(StorageError::Encode)?;

        Ok(Self {
            key: key.into(),
            value,
        })
    }

    /// Decode the entry's JSON value.
    ///
    /// # Errors
    /// Returns [`StorageError::Decode`] if the stored bytes do not match
    /// the expected shape.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        serde_json::from_slice(&self.value).map_err(StorageError::Decode)
    }
}

/// Durable key-value storage provided by the host.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the entry under `key`, if any.
    ///
    /// # Errors
    /// Returns an error only for collaborator faults; a missing entry is
    /// `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StorageError>;

    /// Write an entry, replacing any previous value under its key.
    ///
    /// # Errors
    /// Returns an error if the collaborator rejects the write.
    async fn put(&self, entry: StorageEntry) -> Result<(), StorageError>;
}

/// In-memory storage implementation.
///
/// Suitable for testing and single-node deployments.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>, StorageError> {
        Ok(self.entries.read().get(key).map(|value| StorageEntry {
            key: key.to_string(),
            value: value.clone(),
        }))
    }

    async fn put(&self, entry: StorageEntry) -> Result<(), StorageError> {
        self.entries.write().insert(entry.key, entry.value);
        Ok(())
    }
}
