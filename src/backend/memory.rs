//! Memory Backend Module
//!
//! In-memory string store with an optional quota, mirroring the behavior of a
//! per-origin browser store closely enough to exercise every cache path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::StringStore;

/// Store size of a string in UTF-16 code units, the unit browsers charge
/// against the per-origin quota.
fn units(s: &str) -> usize {
    s.encode_utf16().count()
}

// == Memory Store ==
/// String store backed by a HashMap.
///
/// An optional quota limits the combined UTF-16 length of all keys and
/// values; writes that would exceed it fail with `QuotaExceeded`. The store
/// can also be switched into a disabled state in which every operation fails
/// with `Disabled`, emulating hosts that forbid persistence for the session.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Key-value storage
    entries: RwLock<HashMap<String, String>>,
    /// Combined key+value size limit in UTF-16 code units, if any
    quota_units: Option<usize>,
    /// When set, every operation fails with `Disabled`
    disabled: AtomicBool,
}

impl MemoryStore {
    // == Constructors ==
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose total size (keys plus values, in UTF-16 code
    /// units) may not exceed `quota_units`.
    pub fn with_quota(quota_units: usize) -> Self {
        Self {
            quota_units: Some(quota_units),
            ..Self::default()
        }
    }

    /// Switches the store in or out of the disabled state.
    pub fn set_disabled(&self, disabled: bool) {
        self.disabled.store(disabled, Ordering::SeqCst);
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true when no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn check_enabled(&self) -> Result<()> {
        if self.disabled.load(Ordering::SeqCst) {
            Err(StoreError::Disabled)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StringStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_enabled()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_enabled()?;
        let mut entries = self.entries.write().await;

        if let Some(quota) = self.quota_units {
            let occupied: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| units(k) + units(v))
                .sum();
            if occupied + units(key) + units(value) > quota {
                return Err(StoreError::QuotaExceeded);
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_enabled()?;
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.check_enabled()?;
        self.entries.write().await.clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.check_enabled()?;
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
