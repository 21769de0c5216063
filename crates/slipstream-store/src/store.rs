//! The keyed store contract and the in-memory adapter.

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;

use crate::StoreError;

/// A keyed byte store with prefix-scannable keys.
///
/// This is the contract the state repository consumes. The methods
/// return `Send` futures explicitly (rather than plain `async fn`) so
/// generic callers can hold them across `tokio::spawn` boundaries;
/// implementors still write ordinary `async fn`s.
///
/// Semantics required of every implementation:
/// - `delete` of an absent key succeeds (idempotent);
/// - `scan_prefix` is finite, restartable per call, unordered, and NOT
///   a snapshot — keys it returns may be gone by the time they are
///   fetched, and callers treat that as "not found", never as an error.
pub trait KeyedStore: Send + Sync + 'static {
    /// Fetches the value stored under `key`, if any.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    /// Upserts `value` under `key`.
    fn set(
        &self,
        key: &str,
        value: &[u8],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Returns every key starting with `prefix`, in no particular order.
    fn scan_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory [`KeyedStore`] backed by a `HashMap`.
///
/// The single-process adapter: good for tests and for deployments where
/// session state is as transient as the sessions themselves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    /// `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let data = self
            .data
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;
        data.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut data = self
            .data
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;
        data.remove(key);
        Ok(())
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<String>, StoreError> {
        let data = self
            .data
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".into()))?;
        Ok(data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

// =========================================================================
// Tests
// =========================================================================
