//! Crawler Module
//!
//! Folds over every stored entry belonging to a named cache.

use crate::cache::entry::entry_prefix;
use crate::StringStore;

// == Crawl ==
/// Lists all raw keys in the store, keeps those under this cache's entry
/// prefix, and folds each readable `(key, value)` pair through `step`.
///
/// The metadata key has no trailing `#` and never matches the prefix.
/// Per-key read failures and missing values are skipped rather than aborting
/// the crawl; a failing `keys` listing yields the initial accumulator. A
/// stepper that wants an entry gone records the key in its accumulator and
/// the caller removes it afterwards.
pub async fn crawl<S, A, F>(store: &S, name: &str, init: A, mut step: F) -> A
where
    S: StringStore,
    F: FnMut(&str, &str, A) -> A,
{
    let keys = match store.keys().await {
        Ok(keys) => keys,
        Err(_) => return init,
    };

    let prefix = entry_prefix(name);
    let mut acc = init;
    for key in keys.iter().filter(|key| key.starts_with(&prefix)) {
        if let Ok(Some(value)) = store.get(key).await {
            acc = step(key, &value, acc);
        }
    }
    acc
}
