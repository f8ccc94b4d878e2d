//! Cache Facade Module
//!
//! The public cache surface: typed `get`/`add`/`clear` over a string store,
//! sequencing metadata load, schema migration, and size-aware writes.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::entry::{now_ms, qualified_key, size_bits, EntryEnvelope};
use crate::cache::evict::set_with_eviction;
use crate::cache::metadata::{persist, Metadata};
use crate::cache::migrate::{clear_cache, run_migration};
use crate::cache::queue::EvictionQueue;
use crate::cache::stats::{CacheStats, StatsSnapshot};
use crate::config::CacheConfig;
use crate::StringStore;

// == Quota Cache ==
/// A versioned, size-bounded cache for values of type `T`.
///
/// Values are serialized to a JSON intermediate and stored as `{t, v}`
/// envelopes under keys namespaced by the cache's name. Every operation is a
/// total function: store failures degrade to `None` or a silent no-op, never
/// an error. Losing an entry is part of the contract.
pub struct QuotaCache<T, S> {
    /// Cache descriptor
    config: CacheConfig,
    /// Backing string store
    store: S,
    /// Performance counters
    stats: CacheStats,
    _value: PhantomData<fn() -> T>,
}

impl<T, S> QuotaCache<T, S>
where
    T: Serialize + DeserializeOwned,
    S: StringStore,
{
    // == Constructor ==
    /// Creates a cache over the given store.
    ///
    /// Construction performs no I/O; metadata is created lazily on the first
    /// operation.
    pub fn new(config: CacheConfig, store: S) -> Self {
        Self {
            config,
            store,
            stats: CacheStats::new(),
            _value: PhantomData,
        }
    }

    /// The cache descriptor.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    // == Settle ==
    /// Loads metadata and brings the cache to the configured schema version,
    /// returning the working `(bits, queue)` accounting.
    ///
    /// A version mismatch runs the migrator and persists the rebuilt
    /// metadata immediately, so an interrupted caller never re-applies
    /// upgrade steps to already-upgraded entries.
    async fn settle(&self) -> (i64, EvictionQueue) {
        let metadata = Metadata::load(&self.config, &self.store).await;
        if metadata.version == self.config.version {
            return (metadata.bits, metadata.equeue.into());
        }

        let (bits, queue) = run_migration(&self.config, &self.store, metadata.version).await;
        persist(&self.config, &self.store, &self.stats, bits, queue).await
    }

    // == Get ==
    /// Retrieves a value by key, refreshing its last-touch time.
    ///
    /// Returns `None` when the entry is absent, unreadable, or the store is
    /// unavailable. The touch rewrite is a plain store write: a read never
    /// evicts, and a failed rewrite merely leaves the old touch time.
    pub async fn get(&self, user_key: &str) -> Option<T> {
        let (bits, mut queue) = self.settle().await;
        let raw_key = qualified_key(&self.config.name, user_key);

        let raw = match self.store.get(&raw_key).await {
            Ok(Some(raw)) => raw,
            _ => {
                self.stats.record_miss();
                return None;
            }
        };
        let Some(envelope) = EntryEnvelope::decode(&raw) else {
            self.stats.record_miss();
            return None;
        };
        let value = match serde_json::from_value::<T>(envelope.v.clone()) {
            Ok(value) => value,
            Err(_) => {
                self.stats.record_miss();
                return None;
            }
        };

        let touched = EntryEnvelope {
            t: now_ms(),
            v: envelope.v,
        };
        if let Some(encoded) = touched.encode() {
            let _ = self.store.set(&raw_key, &encoded).await;
        }

        // A touched key is no longer a sensible eviction candidate; the queue
        // is rebuilt with fresh ordering the next time it runs dry.
        if queue.remove_key(&raw_key) {
            persist(&self.config, &self.store, &self.stats, bits, queue).await;
        }

        self.stats.record_hit();
        Some(value)
    }

    // == Add ==
    /// Stores a value at `user_key`, evicting older entries to fit.
    ///
    /// Entries whose own size exceeds the whole budget are never stored; any
    /// previous entry at that key is removed so an outdated value cannot
    /// linger behind a key the caller believes was written.
    pub async fn add(&self, user_key: &str, value: &T) {
        let (bits, queue) = self.settle().await;
        let raw_key = qualified_key(&self.config.name, user_key);

        let Ok(intermediate) = serde_json::to_value(value) else {
            return;
        };
        let envelope = EntryEnvelope {
            t: now_ms(),
            v: intermediate,
        };
        let Some(encoded) = envelope.encode() else {
            return;
        };

        let entry_bits = size_bits(&raw_key, &encoded);
        let max_bits = self.config.max_bits();
        if entry_bits > max_bits {
            debug!(
                cache = %self.config.name,
                key = user_key,
                entry_bits,
                max_bits,
                "entry exceeds the whole cache budget; not stored"
            );
            let _ = self.store.remove(&raw_key).await;
            self.config.notify_overflow(&raw_key);
            return;
        }

        let previous = self.store.get(&raw_key).await.ok().flatten();
        let bits_diff = entry_bits
            - previous
                .map(|old| size_bits(&raw_key, &old))
                .unwrap_or(0);

        let (bits, queue) = set_with_eviction(
            &self.config,
            &self.store,
            &self.stats,
            bits_diff,
            &raw_key,
            &|_, _| encoded.clone(),
            bits,
            queue,
        )
        .await;

        persist(&self.config, &self.store, &self.stats, bits, queue).await;
    }

    // == Clear ==
    /// Removes every entry of this cache and resets metadata.
    pub async fn clear(&self) {
        info!(cache = %self.config.name, "clearing cache");
        clear_cache(&self.config, &self.store).await;
    }
}
