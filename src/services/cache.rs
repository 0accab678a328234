use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use mongodb::bson::oid::ObjectId;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

pub const PENDING_ORDERS: &str = "orders:pending";

/// Expired entries are swept from the map once every this many writes.
const PRUNE_INTERVAL: usize = 64;

pub fn order_key(id: &ObjectId) -> String {
    format!("order:{}", id.to_hex())
}

/// Keys touched by any write to the order `id`.
pub fn order_keys(id: &ObjectId) -> Vec<String> {
    vec![order_key(id), PENDING_ORDERS.to_string()]
}

/// Response cache injected into read paths. Writers invalidate explicitly.
pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn put(&self, key: &str, value: Value, ttl: Duration);
    fn invalidate(&self, keys: &[String]);
}

pub fn get_typed<T: DeserializeOwned>(cache: &dyn ResponseCache, key: &str) -> Option<T> {
    let value = cache.get(key)?;
    match serde_json::from_value(value) {
        Ok(hit) => Some(hit),
        Err(e) => {
            tracing::warn!(key, "⚠️ Dropping undecodable cache entry: {}", e);
            cache.invalidate(&[key.to_string()]);
            None
        }
    }
}

pub fn put_typed<T: Serialize>(cache: &dyn ResponseCache, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_value(value) {
        Ok(json) => cache.put(key, json, ttl),
        Err(e) => tracing::warn!(key, "⚠️ Skipping cache write: {}", e),
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (Instant, Value)>,
    writes: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry whose TTL has run out, read or not.
    pub fn prune_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, (expires_at, _)| *expires_at > now);
        let dropped = before.saturating_sub(self.entries.len());
        if dropped > 0 {
            tracing::debug!(dropped, "🧹 Pruned expired cache entries");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                let (expires_at, value) = entry.value();
                if *expires_at > Instant::now() {
                    return Some(value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    fn put(&self, key: &str, value: Value, ttl: Duration) {
        self.entries
            .insert(key.to_string(), (Instant::now() + ttl, value));
        if self.writes.fetch_add(1, Ordering::Relaxed) % PRUNE_INTERVAL == PRUNE_INTERVAL - 1 {
            self.prune_expired();
        }
    }

    fn invalidate(&self, keys: &[String]) {
        for key in keys {
            self.entries.remove(key);
        }
    }
}
