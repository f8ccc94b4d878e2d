//! Configuration Module
//!
//! Describes a logical cache: its name, schema version, byte budget, eviction
//! policy, and the upgrade steps between schema versions.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// == Eviction Policy ==
/// Eviction policy tag persisted in cache metadata.
///
/// Only least-recently-used eviction is defined; other tags found in persisted
/// metadata fail to decode and the metadata is treated as empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicy {
    /// Evict the entry with the oldest last-touch time first
    #[default]
    #[serde(rename = "LRU")]
    Lru,
}

// == Upgrade Function ==
/// A single schema upgrade step.
///
/// Receives the user key and the entry's intermediate value at the source
/// version; returns the value at the target version, or `None` to drop the
/// entry entirely.
pub type UpgradeFn = Arc<dyn Fn(&str, Value) -> Option<Value> + Send + Sync>;

/// Hook invoked with the qualified key when a write could not be accommodated.
pub type OverflowHook = Arc<dyn Fn(&str) + Send + Sync>;

// == Migration Edge ==
/// A directed upgrade edge between two schema versions.
///
/// Edges must satisfy `from < to`; malformed edges are dropped when the
/// migration graph is built.
#[derive(Clone)]
pub struct Migration {
    /// Source schema version
    pub from: u32,
    /// Target schema version
    pub to: u32,
    /// Value transformer applied to each entry
    pub upgrade: UpgradeFn,
}

impl Migration {
    /// Creates a migration edge from an upgrade closure.
    pub fn new<F>(from: u32, to: u32, upgrade: F) -> Self
    where
        F: Fn(&str, Value) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            from,
            to,
            upgrade: Arc::new(upgrade),
        }
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

// == Cache Config ==
/// Describes one logical cache sharing a string persistence store.
///
/// All raw keys touched under this configuration are namespaced by `name`:
/// the metadata record lives at `"#<name>"` and entries at
/// `"#<name>#<userKey>"`.
#[derive(Clone)]
pub struct CacheConfig {
    /// Non-empty namespace for all keys of this cache
    pub name: String,
    /// Current schema version
    pub version: u32,
    /// Byte budget in kilobytes; all accounting uses `max_bits()`
    pub kilobytes: u64,
    /// Eviction policy tag
    pub policy: EvictionPolicy,
    /// Upgrade edges between schema versions
    pub migrations: Vec<Migration>,
    /// Optional hook fired when a write cannot be accommodated
    pub overflow: Option<OverflowHook>,
}

impl CacheConfig {
    // == Constructor ==
    /// Creates a configuration with the given namespace, version, and budget.
    ///
    /// A zero-kilobyte budget is accepted but rejects every write; a warning
    /// is logged so the misconfiguration is visible.
    pub fn new(name: impl Into<String>, version: u32, kilobytes: u64) -> Self {
        let name = name.into();
        if kilobytes == 0 {
            warn!(cache = %name, "cache budget is zero; all writes will be rejected");
        }
        Self {
            name,
            version,
            kilobytes,
            policy: EvictionPolicy::Lru,
            migrations: Vec::new(),
            overflow: None,
        }
    }

    /// Replaces the migration edge list.
    pub fn with_migrations(mut self, migrations: Vec<Migration>) -> Self {
        self.migrations = migrations;
        self
    }

    /// Installs a hook fired when a write cannot be accommodated.
    pub fn with_overflow<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.overflow = Some(Arc::new(hook));
        self
    }

    // == Budget ==
    /// Total budget in bits: `8 * 1024 * kilobytes`.
    ///
    /// The bit count is an abstract size proxy (16 bits per UTF-16 code unit
    /// of key and value), not the real byte cost in the backing store.
    pub fn max_bits(&self) -> i64 {
        8 * 1024 * self.kilobytes as i64
    }

    /// Invokes the overflow hook, if installed.
    pub(crate) fn notify_overflow(&self, raw_key: &str) {
        if let Some(hook) = &self.overflow {
            hook(raw_key);
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("kilobytes", &self.kilobytes)
            .field("policy", &self.policy)
            .field("migrations", &self.migrations)
            .finish()
    }
}
