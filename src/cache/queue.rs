//! Eviction Queue Module
//!
//! Ordered queue of eviction candidates persisted alongside cache metadata.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

// == Queue Entry ==
/// One eviction candidate: a qualified key and its recorded size in bits.
///
/// Persisted in metadata as `{"k": key, "v": bits}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Qualified raw key of the candidate entry
    #[serde(rename = "k")]
    pub key: String,
    /// Size of the entry in bits when it was enqueued
    #[serde(rename = "v")]
    pub bits: i64,
}

// == Eviction Queue ==
/// Tracks eviction candidates for the LRU policy.
///
/// Keys are stored in a VecDeque where:
/// - Front = Least recently used (next eviction candidate)
/// - Back = Most recently used
///
/// The queue is a bounded witness, not the source of truth: it may lag behind
/// the store after interleaved operations, so consumers tolerate stale or
/// missing entries and rebuild it from stored timestamps when it runs dry.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EvictionQueue {
    /// Candidates ordered oldest first
    order: VecDeque<QueueEntry>,
}

impl EvictionQueue {
    // == Constructor ==
    /// Creates a new empty queue.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Push Back ==
    /// Appends a candidate as the most recently used.
    pub fn push_back(&mut self, entry: QueueEntry) {
        self.order.push_back(entry);
    }

    // == Pop Front ==
    /// Removes and returns the least recently used candidate.
    ///
    /// Returns None if the queue is empty.
    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        self.order.pop_front()
    }

    // == Remove Key ==
    /// Removes a key from the queue, returning whether it was present.
    pub fn remove_key(&mut self, key: &str) -> bool {
        let before = self.order.len();
        self.order.retain(|entry| entry.key != key);
        self.order.len() != before
    }

    // == Contains ==
    /// Checks if a key is queued.
    #[allow(dead_code)]
    pub fn contains_key(&self, key: &str) -> bool {
        self.order.iter().any(|entry| entry.key == key)
    }

    // == Length ==
    /// Returns the number of queued candidates.
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // == Persisted Form ==
    /// Returns the first `cap` candidates, the slice persisted in metadata.
    pub fn persisted(&self, cap: usize) -> Vec<QueueEntry> {
        self.order.iter().take(cap).cloned().collect()
    }
}

impl From<Vec<QueueEntry>> for EvictionQueue {
    fn from(entries: Vec<QueueEntry>) -> Self {
        Self {
            order: entries.into(),
        }
    }
}

impl FromIterator<QueueEntry> for EvictionQueue {
    fn from_iter<I: IntoIterator<Item = QueueEntry>>(iter: I) -> Self {
        Self {
            order: iter.into_iter().collect(),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, bits: i64) -> QueueEntry {
        QueueEntry {
            key: key.to_string(),
            bits,
        }
    }

    #[test]
    fn test_queue_new() {
        let queue = EvictionQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_queue_pop_front_is_oldest() {
        let mut queue = EvictionQueue::new();

        queue.push_back(entry("#c#a", 10));
        queue.push_back(entry("#c#b", 20));
        queue.push_back(entry("#c#c", 30));

        assert_eq!(queue.pop_front(), Some(entry("#c#a", 10)));
        assert_eq!(queue.pop_front(), Some(entry("#c#b", 20)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_queue_pop_empty() {
        let mut queue = EvictionQueue::new();
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn test_queue_remove_key() {
        let mut queue = EvictionQueue::new();

        queue.push_back(entry("#c#a", 10));
        queue.push_back(entry("#c#b", 20));
        queue.push_back(entry("#c#c", 30));

        assert!(queue.remove_key("#c#b"));
        assert!(!queue.remove_key("#c#b"));

        assert_eq!(queue.len(), 2);
        assert!(queue.contains_key("#c#a"));
        assert!(!queue.contains_key("#c#b"));
        assert!(queue.contains_key("#c#c"));
    }

    #[test]
    fn test_queue_remove_nonexistent_key() {
        let mut queue = EvictionQueue::new();
        queue.push_back(entry("#c#a", 10));

        assert!(!queue.remove_key("#c#zzz"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_queue_persisted_cap() {
        let mut queue = EvictionQueue::new();
        for i in 0..30 {
            queue.push_back(entry(&format!("#c#k{i}"), i));
        }

        let persisted = queue.persisted(20);
        assert_eq!(persisted.len(), 20);
        // The oldest candidates survive the trim
        assert_eq!(persisted[0].key, "#c#k0");
        assert_eq!(persisted[19].key, "#c#k19");
        // Trimming does not consume the in-memory queue
        assert_eq!(queue.len(), 30);
    }

    #[test]
    fn test_queue_entry_wire_layout() {
        let encoded = serde_json::to_string(&entry("#c#a", 96)).unwrap();
        assert_eq!(encoded, r##"{"k":"#c#a","v":96}"##);

        let decoded: QueueEntry = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, entry("#c#a", 96));
    }

    #[test]
    fn test_queue_from_vec_preserves_order() {
        let queue = EvictionQueue::from(vec![entry("#c#a", 1), entry("#c#b", 2)]);
        assert_eq!(queue.persisted(20)[0].key, "#c#a");
    }
}
