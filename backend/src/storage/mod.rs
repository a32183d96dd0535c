//! Key-value persistence port.
//!
//! Consent and attribution state is persisted through [`KeyValueStore`]
//! instead of being read ad hoc from cookies. Entries may carry a TTL; once it
//! elapses `get` reports the entry as absent and the backend deletes it lazily.
//!
//! - `sqlite`: production implementation on a single `kv` table.
//! - `memory`: process-local implementation for tests and throwaway runs.

pub mod memory;
pub mod sqlite;

use crate::error::StoreError;
use crate::visitor::VisitorId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use memory::MemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Inserts or replaces `key`. `ttl = None` means the entry never expires.
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Storage key of a per-visitor entry, e.g. `consent:{visitor}`.
pub fn visitor_key(namespace: &str, visitor: &VisitorId) -> String {
    format!("{}:{}", namespace, visitor)
}

pub fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn put_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.put(key, &raw, ttl)
}

pub fn unix_now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Absolute expiry in unix milliseconds for a TTL starting now.
pub(crate) fn expires_at(ttl: Option<Duration>) -> Option<i64> {
    ttl.map(|t| unix_now_ms().saturating_add(t.as_millis() as i64))
}

pub(crate) fn is_expired(expires_at: Option<i64>) -> bool {
    expires_at.is_some_and(|at| at <= unix_now_ms())
}
