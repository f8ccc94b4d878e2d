//! Backend Module
//!
//! Defines the contract for string persistence stores and provides an
//! in-memory implementation.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::Result;

// == String Store Trait ==
/// Contract over a string-keyed persistence store.
///
/// The canonical target is a per-origin browser store: string keys map to
/// string values under a hard byte quota, and the user may clear the store
/// out-of-band at any time. Implementations must report exactly two failure
/// kinds: [`StoreError::Disabled`](crate::StoreError::Disabled) when the
/// store is unavailable for the session, and
/// [`StoreError::QuotaExceeded`](crate::StoreError::QuotaExceeded) when a
/// write would exceed the quota.
///
/// # Required Semantics
///
/// - `get` returns the exact string last `set` for the key, or `None`.
/// - `set` succeeds durably or fails with `QuotaExceeded`.
/// - `keys` enumerates all keys currently present, in any order.
#[async_trait]
pub trait StringStore: Send + Sync {
    /// Reads the value stored at `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the value stored at `key`. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Removes every key in the store.
    async fn clear(&self) -> Result<()>;

    /// Lists all keys currently present.
    async fn keys(&self) -> Result<Vec<String>>;
}

// Shared handles delegate, so one store can back several caches.
#[async_trait]
impl<S: StringStore + ?Sized> StringStore for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> Result<()> {
        (**self).clear().await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        (**self).keys().await
    }
}
