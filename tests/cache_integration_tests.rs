//! Integration Tests for the Cache
//!
//! Exercises the public surface end to end over a shared in-memory store:
//! round-trips, LRU eviction under a tight budget, touch promotion, schema
//! migrations, and the degraded boundary behaviors.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use quota_cache::{CacheConfig, MemoryStore, Migration, QuotaCache, StringStore};

// == Helper Functions ==

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Payload {
    x: i64,
}

fn shared_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

fn typed_cache(
    store: &Arc<MemoryStore>,
    kilobytes: u64,
) -> QuotaCache<Payload, Arc<MemoryStore>> {
    QuotaCache::new(CacheConfig::new("s", 1, kilobytes), Arc::clone(store))
}

fn string_cache(
    store: &Arc<MemoryStore>,
    kilobytes: u64,
) -> QuotaCache<String, Arc<MemoryStore>> {
    QuotaCache::new(CacheConfig::new("s", 1, kilobytes), Arc::clone(store))
}

/// Advances wall-clock touch times so insertion order is unambiguous.
async fn tick() {
    tokio::time::sleep(Duration::from_millis(3)).await;
}

/// A value sized so eight entries roughly fill a one-kilobyte budget.
fn filler() -> String {
    "x".repeat(33)
}

// == Round-Trip Tests ==

#[tokio::test]
async fn test_basic_round_trip() {
    let store = shared_store();
    let cache = typed_cache(&store, 1);

    cache.add("a", &Payload { x: 1 }).await;
    assert_eq!(cache.get("a").await, Some(Payload { x: 1 }));
}

#[tokio::test]
async fn test_values_survive_across_instances() {
    let store = shared_store();

    let first = typed_cache(&store, 1);
    first.add("a", &Payload { x: 7 }).await;
    drop(first);

    let second = typed_cache(&store, 1);
    assert_eq!(second.get("a").await, Some(Payload { x: 7 }));
}

// == Eviction Tests ==

#[tokio::test]
async fn test_lru_eviction_drops_oldest() {
    let store = shared_store();
    let cache = string_cache(&store, 1);

    // Ten ~1000-bit entries cannot all fit in 8192 bits
    for i in 0..10 {
        cache.add(&format!("k{i}"), &filler()).await;
        tick().await;
    }

    assert_eq!(cache.get("k0").await, None);
    assert_eq!(cache.get("k9").await, Some(filler()));
}

#[tokio::test]
async fn test_touched_entry_survives_eviction() {
    let store = shared_store();
    let cache = string_cache(&store, 1);

    let keys = ["a", "b", "c", "d", "e", "f", "g", "h"];
    for key in keys {
        cache.add(key, &filler()).await;
        tick().await;
    }

    // Touch the oldest entry, then overflow the budget
    assert!(cache.get("a").await.is_some());
    tick().await;
    cache.add("z", &filler()).await;

    assert!(cache.get("a").await.is_some(), "touched entry was evicted");
    assert!(cache.get("z").await.is_some());

    let mut survivors = 0;
    for key in &keys[1..] {
        if cache.get(key).await.is_some() {
            survivors += 1;
        }
    }
    assert_eq!(survivors, keys.len() - 2, "exactly one older entry evicted");
}

#[tokio::test]
async fn test_budget_respected_at_rest() {
    let store = shared_store();
    let cache = string_cache(&store, 1);

    for i in 0..20 {
        cache.add(&format!("k{i}"), &filler()).await;
        tick().await;
    }

    let metadata: Value =
        serde_json::from_str(&store.get("#s").await.unwrap().unwrap()).unwrap();
    let bits = metadata["bits"].as_i64().unwrap();
    assert!(bits <= 8192, "accounted bits {bits} exceed the budget");
    assert!(metadata["equeue"].as_array().unwrap().len() <= 20);
}

// == Boundary Tests ==

#[tokio::test]
async fn test_too_large_entry_is_never_stored() {
    let store = shared_store();
    let cache = string_cache(&store, 1);

    // Well past 8192 bits once the envelope and key are accounted
    cache.add("huge", &"y".repeat(600)).await;

    assert_eq!(cache.get("huge").await, None);
    for key in store.keys().await.unwrap() {
        assert_eq!(key, "#s", "oversized entry left residue at {key}");
    }
}

#[tokio::test]
async fn test_zero_budget_rejects_all_writes() {
    let store = shared_store();
    let cache = typed_cache(&store, 0);

    cache.add("a", &Payload { x: 1 }).await;
    assert_eq!(cache.get("a").await, None);
}

#[tokio::test]
async fn test_clear_then_get_misses() {
    let store = shared_store();
    let cache = typed_cache(&store, 1);

    cache.add("a", &Payload { x: 1 }).await;
    cache.add("b", &Payload { x: 2 }).await;
    cache.clear().await;

    assert_eq!(cache.get("a").await, None);
    assert_eq!(cache.get("b").await, None);
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let store = shared_store();
    let cache = typed_cache(&store, 1);

    cache.add("a", &Payload { x: 1 }).await;
    cache.clear().await;
    let after_first = store.get("#s").await.unwrap();

    cache.clear().await;
    let after_second = store.get("#s").await.unwrap();

    assert_eq!(after_first, after_second);
    assert_eq!(store.keys().await.unwrap(), vec!["#s".to_string()]);
}

#[tokio::test]
async fn test_corrupt_metadata_recovers() {
    let store = shared_store();
    store.set("#s", "][ not metadata").await.unwrap();

    let cache = typed_cache(&store, 1);
    cache.add("a", &Payload { x: 5 }).await;
    assert_eq!(cache.get("a").await, Some(Payload { x: 5 }));

    // The next write replaced the corrupt record with a readable one
    let metadata: Value =
        serde_json::from_str(&store.get("#s").await.unwrap().unwrap()).unwrap();
    assert_eq!(metadata["version"], json!(1));
}

// == Migration Tests ==

fn upgrade_chain() -> Vec<Migration> {
    vec![
        Migration::new(1, 2, |_, value| {
            let mut object = value.as_object().cloned()?;
            object.insert("a".to_string(), json!(1));
            Some(Value::Object(object))
        }),
        Migration::new(2, 3, |_, value| {
            let mut object = value.as_object().cloned()?;
            let moved = object.remove("a")?;
            object.insert("b".to_string(), moved);
            Some(Value::Object(object))
        }),
    ]
}

#[tokio::test]
async fn test_migration_rewrites_all_entries() {
    let store = shared_store();

    let old: QuotaCache<Value, _> =
        QuotaCache::new(CacheConfig::new("s", 1, 4), Arc::clone(&store));
    old.add("k1", &json!({"x": 1})).await;
    tick().await;
    old.add("k2", &json!({"x": 2})).await;
    drop(old);

    let new: QuotaCache<Value, _> = QuotaCache::new(
        CacheConfig::new("s", 3, 4).with_migrations(upgrade_chain()),
        Arc::clone(&store),
    );

    for key in ["k1", "k2"] {
        let value = new.get(key).await.unwrap();
        assert_eq!(value.get("b"), Some(&json!(1)), "field b missing on {key}");
        assert!(value.get("a").is_none(), "field a lingers on {key}");
    }

    let metadata: Value =
        serde_json::from_str(&store.get("#s").await.unwrap().unwrap()).unwrap();
    assert_eq!(metadata["version"], json!(3));
}

#[tokio::test]
async fn test_migration_gap_clears_cache() {
    let store = shared_store();

    let old: QuotaCache<Value, _> =
        QuotaCache::new(CacheConfig::new("s", 1, 4), Arc::clone(&store));
    old.add("k1", &json!({"x": 1})).await;
    drop(old);

    // Steps 1->2 and 3->4 cannot reach version 5
    let new: QuotaCache<Value, _> = QuotaCache::new(
        CacheConfig::new("s", 5, 4).with_migrations(vec![
            Migration::new(1, 2, |_, v| Some(v)),
            Migration::new(3, 4, |_, v| Some(v)),
        ]),
        Arc::clone(&store),
    );

    assert_eq!(new.get("k1").await, None);

    let metadata: Value =
        serde_json::from_str(&store.get("#s").await.unwrap().unwrap()).unwrap();
    assert_eq!(metadata["version"], json!(5));
    assert_eq!(metadata["bits"], json!(0));
}

#[tokio::test]
async fn test_migration_drop_step_discards_entry() {
    let store = shared_store();

    let old: QuotaCache<Value, _> =
        QuotaCache::new(CacheConfig::new("s", 1, 4), Arc::clone(&store));
    old.add("stale", &json!({"schema": "old"})).await;
    tick().await;
    old.add("fresh", &json!({"schema": "new"})).await;
    drop(old);

    let new: QuotaCache<Value, _> = QuotaCache::new(
        CacheConfig::new("s", 2, 4).with_migrations(vec![Migration::new(1, 2, |_, value| {
            if value.get("schema") == Some(&json!("new")) {
                Some(value)
            } else {
                None
            }
        })]),
        Arc::clone(&store),
    );

    assert_eq!(new.get("stale").await, None);
    assert!(new.get("fresh").await.is_some());
}

#[tokio::test]
async fn test_migration_runs_once_across_operations() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let store = shared_store();

    let old: QuotaCache<Value, _> =
        QuotaCache::new(CacheConfig::new("s", 1, 4), Arc::clone(&store));
    old.add("k", &json!({"x": 1})).await;
    drop(old);

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let new: QuotaCache<Value, _> = QuotaCache::new(
        CacheConfig::new("s", 2, 4).with_migrations(vec![Migration::new(1, 2, move |_, v| {
            seen.fetch_add(1, Ordering::SeqCst);
            Some(v)
        })]),
        Arc::clone(&store),
    );

    assert!(new.get("k").await.is_some());
    assert!(new.get("k").await.is_some());
    new.add("k2", &json!({"x": 2})).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1, "entries were re-upgraded");
}
