//! Eviction Engine Module
//!
//! Size-aware writes: attempt a store write, and on overflow evict the oldest
//! queued candidates one by one until the write lands or nothing is left to
//! evict.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::cache::crawl::crawl;
use crate::cache::entry::{size_bits, EntryEnvelope};
use crate::cache::queue::{EvictionQueue, QueueEntry};
use crate::cache::stats::CacheStats;
use crate::config::CacheConfig;
use crate::StringStore;

// == Set With Eviction ==
/// Attempts to write `raw_key`, evicting queued entries until it fits.
///
/// The write is skipped outright while `bits + bits_diff` exceeds the budget;
/// otherwise it is attempted, and any store failure (quota or not) falls into
/// the eviction loop. `make_value` is called with the accounting current at
/// each attempt so metadata writes reflect victims already evicted mid-retry.
///
/// When the queue runs dry it is rebuilt once from stored timestamps; if the
/// write still cannot land after the rebuilt queue drains too, the engine
/// gives up and reports `(0, [])`, leaving the next operation to self-heal
/// through a fresh rebuild.
///
/// # Returns
/// The `(bits, queue)` accounting after the write attempt.
pub async fn set_with_eviction<S: StringStore>(
    config: &CacheConfig,
    store: &S,
    stats: &CacheStats,
    bits_diff: i64,
    raw_key: &str,
    make_value: &(dyn Fn(i64, &EvictionQueue) -> String + Send + Sync),
    mut bits: i64,
    mut queue: EvictionQueue,
) -> (i64, EvictionQueue) {
    let max_bits = config.max_bits();
    let mut rebuilt = false;

    loop {
        if bits + bits_diff <= max_bits
            && store
                .set(raw_key, &make_value(bits, &queue))
                .await
                .is_ok()
        {
            return ((bits + bits_diff).max(0), queue);
        }

        let victim = match queue.pop_front() {
            Some(victim) => victim,
            None if !rebuilt => {
                rebuilt = true;
                queue = rebuild_queue(store, &config.name).await;
                match queue.pop_front() {
                    Some(victim) => victim,
                    None => break,
                }
            }
            None => break,
        };

        debug!(victim = %victim.key, bits = victim.bits, "evicting entry to reclaim budget");
        let _ = store.remove(&victim.key).await;
        stats.record_eviction();
        bits = (bits - victim.bits).max(0);
    }

    warn!(key = raw_key, "write abandoned after exhausting eviction candidates");
    config.notify_overflow(raw_key);
    (0, EvictionQueue::new())
}

// == Queue Rebuilder ==
/// Reconstructs the eviction queue from the entries actually present.
///
/// Crawls this cache's entries, indexes them by last-touch time, and returns
/// them oldest first. Entries whose envelope does not decode are removed
/// during the crawl. Entries sharing a timestamp collapse to one; duplicate
/// touch times are rare and the survivor is arbitrary.
pub async fn rebuild_queue<S: StringStore>(store: &S, name: &str) -> EvictionQueue {
    let (by_time, dead) = crawl(
        store,
        name,
        (BTreeMap::<u64, QueueEntry>::new(), Vec::<String>::new()),
        |key, value, (mut by_time, mut dead)| {
            match EntryEnvelope::decode(value) {
                Some(envelope) => {
                    by_time.insert(
                        envelope.t,
                        QueueEntry {
                            key: key.to_string(),
                            bits: size_bits(key, value),
                        },
                    );
                }
                None => dead.push(key.to_string()),
            }
            (by_time, dead)
        },
    )
    .await;

    for key in dead {
        debug!(key = %key, "removing unreadable entry found during rebuild");
        let _ = store.remove(&key).await;
    }

    by_time.into_values().collect()
}
