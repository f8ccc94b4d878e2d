//! Cache Entry Module
//!
//! Defines the stored entry envelope, raw key qualification, and the size
//! accounting shared by the budget checks.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Key Qualification ==
/// Raw store key for a user entry: `"#<name>#<userKey>"`.
pub fn qualified_key(name: &str, user_key: &str) -> String {
    format!("#{name}#{user_key}")
}

/// Raw store key for a cache's metadata record: `"#<name>"`.
pub fn metadata_key(name: &str) -> String {
    format!("#{name}")
}

/// Prefix owned by a cache's entries. The metadata key does not carry the
/// trailing `#`, so it never matches.
pub fn entry_prefix(name: &str) -> String {
    format!("#{name}#")
}

// == Size Accounting ==
/// Size of a stored record in bits: 16 per UTF-16 code unit of key and value.
///
/// This is an abstract size proxy rather than the real byte cost, chosen so
/// that accounting matches metadata persisted by prior sessions on hosts that
/// measure strings in UTF-16 code units.
pub fn size_bits(raw_key: &str, raw_value: &str) -> i64 {
    16 * (utf16_len(raw_key) + utf16_len(raw_value))
}

fn utf16_len(s: &str) -> i64 {
    s.encode_utf16().count() as i64
}

// == Entry Envelope ==
/// Wrapper persisted at a qualified key: last-touch time plus the encoded
/// intermediate value.
///
/// Unknown fields in persisted envelopes are ignored; envelopes that fail to
/// decode are treated as absent and removed opportunistically during crawls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryEnvelope {
    /// Milliseconds timestamp of the most recent get or add
    pub t: u64,
    /// Opaque encoded intermediate value
    pub v: Value,
}

impl EntryEnvelope {
    /// Serializes the envelope to its stored JSON form.
    pub fn encode(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Parses a stored JSON envelope; `None` on any decode failure.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_millis() as u64
}
