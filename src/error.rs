//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Store Error Enum ==
/// Failures surfaced by a string persistence store.
///
/// These are the only two failure kinds a backing store may report. Neither
/// escapes a public cache operation: `Disabled` degrades the operation to a
/// no-op and `QuotaExceeded` is consumed by the eviction engine.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// The store is unavailable in this host session
    #[error("persistence store is disabled")]
    Disabled,

    /// A write would exceed the store's byte quota
    #[error("persistence store quota exceeded")]
    QuotaExceeded,
}

// == Result Type Alias ==
/// Convenience Result type for store interactions.
pub type Result<T> = std::result::Result<T, StoreError>;
