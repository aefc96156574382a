use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

/// In-process key-value store with a per-entry time-to-live.
///
/// Values are kept as JSON so one store can hold differently shaped
/// entries (a single result, a history list, ...). Expired entries are
/// evicted lazily on access. Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, CacheEntry>>,
}

#[derive(Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `key`. Last write wins.
    pub fn put<T: Serialize>(&self, key: impl Into<String>, value: &T, ttl: Duration) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => {
                self.inner.insert(
                    key,
                    CacheEntry {
                        value,
                        expires_at: Instant::now() + ttl,
                    },
                );
            }
            Err(e) => warn!(key = %key, error = %e, "Could not serialize cache value"),
        }
    }

    /// Fetch `key` if present, unexpired and decodable as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = {
            let entry = self.inner.get(key)?;
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        };

        match value {
            Some(v) => serde_json::from_value(v).ok(),
            None => {
                self.inner.remove(key);
                None
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        match self.inner.get(key) {
            Some(entry) => entry.expires_at > Instant::now(),
            None => false,
        }
    }

    pub fn forget(&self, key: &str) {
        self.inner.remove(key);
    }
}
