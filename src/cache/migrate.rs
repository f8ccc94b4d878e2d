//! Migration Module
//!
//! Carries a cache's entries from the schema version found in persisted
//! metadata to the configured version, or clears the cache when no upgrade
//! path exists.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::crawl::crawl;
use crate::cache::entry::{entry_prefix, metadata_key, size_bits, EntryEnvelope};
use crate::cache::graph::MigrationGraph;
use crate::cache::metadata::Metadata;
use crate::cache::queue::{EvictionQueue, QueueEntry};
use crate::config::{CacheConfig, UpgradeFn};
use crate::StringStore;

// == Clear ==
/// Removes every key owned by this cache, then writes a fresh empty metadata
/// record at the configured version. Individual failures are swallowed.
pub async fn clear_cache<S: StringStore>(config: &CacheConfig, store: &S) {
    let meta_key = metadata_key(&config.name);
    let prefix = entry_prefix(&config.name);

    let keys = store.keys().await.unwrap_or_default();
    for key in keys
        .iter()
        .filter(|key| *key == &meta_key || key.starts_with(&prefix))
    {
        let _ = store.remove(key).await;
    }

    let _ = store.set(&meta_key, &Metadata::empty(config).encode()).await;
}

// == Run Migration ==
/// Upgrades every entry from `from_version` to the configured version.
///
/// Plans a shortest chain of upgrade steps through the migration graph; if no
/// chain exists the cache is cleared and reinitialized at the new version.
/// Otherwise entries are crawled, rewritten oldest-first, and re-accounted.
/// Entries the chain drops, entries that no longer decode, and entries past
/// the point where the budget runs out are removed from the store, so no
/// stale-schema value survives the upgrade.
///
/// # Returns
/// The rebuilt `(bits, queue)` accounting, queue ordered oldest first.
pub async fn run_migration<S: StringStore>(
    config: &CacheConfig,
    store: &S,
    from_version: u32,
) -> (i64, EvictionQueue) {
    let graph = MigrationGraph::build(&config.migrations, from_version, config.version);
    let Some(path) = graph.shortest_path(from_version, config.version) else {
        warn!(
            cache = %config.name,
            from = from_version,
            to = config.version,
            "no upgrade path between versions; clearing cache"
        );
        clear_cache(config, store).await;
        return (0, EvictionQueue::new());
    };

    info!(
        cache = %config.name,
        from = from_version,
        to = config.version,
        steps = path.len(),
        "migrating cache entries"
    );

    let upgrade = compose(path);
    let prefix = entry_prefix(&config.name);

    // Buffer surviving entries grouped by touch time so older entries win
    // when the budget tightens after the upgrade.
    type Buffered = BTreeMap<u64, Vec<(String, Value)>>;
    let (buffered, dead) = crawl(
        store,
        &config.name,
        (Buffered::new(), Vec::<String>::new()),
        |key, value, (mut buffered, mut dead)| {
            match EntryEnvelope::decode(value) {
                Some(envelope) => {
                    let user_key = key.strip_prefix(&prefix).unwrap_or(key);
                    match upgrade(user_key, envelope.v) {
                        Some(upgraded) => buffered
                            .entry(envelope.t)
                            .or_default()
                            .push((key.to_string(), upgraded)),
                        None => dead.push(key.to_string()),
                    }
                }
                None => dead.push(key.to_string()),
            }
            (buffered, dead)
        },
    )
    .await;

    for key in &dead {
        let _ = store.remove(key).await;
    }

    let max_bits = config.max_bits();
    let mut bits = 0i64;
    let mut queue = EvictionQueue::new();
    let mut exhausted = false;

    for (t, group) in buffered {
        for (raw_key, value) in group {
            if exhausted {
                let _ = store.remove(&raw_key).await;
                continue;
            }

            let envelope = EntryEnvelope { t, v: value };
            let Some(encoded) = envelope.encode() else {
                let _ = store.remove(&raw_key).await;
                continue;
            };

            let entry_bits = size_bits(&raw_key, &encoded);
            if bits + entry_bits > max_bits {
                debug!(
                    cache = %config.name,
                    key = %raw_key,
                    "budget reached while rewriting; dropping newer entries"
                );
                exhausted = true;
                let _ = store.remove(&raw_key).await;
                continue;
            }

            match store.set(&raw_key, &encoded).await {
                Ok(()) => {
                    bits += entry_bits;
                    queue.push_back(QueueEntry {
                        key: raw_key,
                        bits: entry_bits,
                    });
                }
                Err(_) => {
                    let _ = store.remove(&raw_key).await;
                }
            }
        }
    }

    (bits, queue)
}

/// Chains upgrade steps into one transformer; a step returning `None` drops
/// the entry.
fn compose(path: Vec<UpgradeFn>) -> impl Fn(&str, Value) -> Option<Value> {
    move |key, value| {
        let mut current = value;
        for step in &path {
            current = step(key, current)?;
        }
        Some(current)
    }
}
