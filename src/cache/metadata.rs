//! Cache Metadata Module
//!
//! The per-cache metadata record: schema version, accounted size, and the
//! persisted eviction queue. Loading synthesizes an empty record whenever the
//! stored one is absent or unreadable; persisting goes through the eviction
//! engine so that a failing metadata write itself frees space.

use serde::{Deserialize, Serialize};

use crate::cache::entry::metadata_key;
use crate::cache::evict::set_with_eviction;
use crate::cache::queue::{EvictionQueue, QueueEntry};
use crate::cache::stats::CacheStats;
use crate::cache::EQUEUE_PERSIST_CAP;
use crate::config::{CacheConfig, EvictionPolicy};
use crate::StringStore;

// == Metadata Record ==
/// Persisted at `"#<name>"` as
/// `{"version":…,"bits":…,"equeue":[{"k":…,"v":…},…],"policy":"LRU"}`.
///
/// Every field defaults individually, so records written by newer revisions
/// (or truncated by the host) still decode; a record that fails to decode
/// altogether is replaced by a fresh empty one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Schema version the cache was last written at
    #[serde(default)]
    pub version: u32,
    /// Accounted size of all entries, in bits
    #[serde(default)]
    pub bits: i64,
    /// Persisted eviction candidates, oldest first
    #[serde(default)]
    pub equeue: Vec<QueueEntry>,
    /// Eviction policy tag
    #[serde(default)]
    pub policy: EvictionPolicy,
}

impl Metadata {
    // == Empty Record ==
    /// Fresh metadata for a cache that has no readable record.
    pub fn empty(config: &CacheConfig) -> Self {
        Self {
            version: config.version,
            bits: 0,
            equeue: Vec::new(),
            policy: config.policy,
        }
    }

    // == Codec ==
    /// Serializes the record to its stored JSON form.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("metadata record always serializes")
    }

    /// Parses a stored record; `None` on any decode failure.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    // == Load ==
    /// Reads this cache's metadata, synthesizing an empty record when the key
    /// is absent, the store fails, or the stored record does not decode.
    pub async fn load<S: StringStore>(config: &CacheConfig, store: &S) -> Self {
        match store.get(&metadata_key(&config.name)).await {
            Ok(Some(raw)) => Self::decode(&raw).unwrap_or_else(|| Self::empty(config)),
            _ => Self::empty(config),
        }
    }
}

// == Persist ==
/// Writes metadata for the current `(bits, queue)` through the eviction
/// engine, trimming the queue to its persisted cap.
///
/// The value closure re-encodes on every attempt, so the record written after
/// evictions reflects the post-eviction accounting. If the engine exhausts
/// every candidate without landing the write, accounting resets to `(0, [])`.
pub async fn persist<S: StringStore>(
    config: &CacheConfig,
    store: &S,
    stats: &CacheStats,
    bits: i64,
    queue: EvictionQueue,
) -> (i64, EvictionQueue) {
    let version = config.version;
    let policy = config.policy;
    let raw_key = metadata_key(&config.name);
    let make_value = |current_bits: i64, current_queue: &EvictionQueue| {
        Metadata {
            version,
            bits: current_bits,
            equeue: current_queue.persisted(EQUEUE_PERSIST_CAP),
            policy,
        }
        .encode()
    };

    set_with_eviction(config, store, stats, 0, &raw_key, &make_value, bits, queue).await
}
