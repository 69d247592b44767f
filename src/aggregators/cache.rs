//! Private per-aggregator TTL cache of parsed backend responses.
//! Keyed by the exact identifier sent upstream, so one caller's answer is never served to another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::model::UserAttribute;

const RESPONSE_CACHE_MAX: usize = 10_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    attributes: Vec<UserAttribute>,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self { Self::with_capacity(ttl, RESPONSE_CACHE_MAX) }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<UserAttribute>> {
        if let Some(hit) = self.entries.read().get(key) {
            if hit.expires_at > Instant::now() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                crate::tprintln!("response cache hit: key={}", key);
                return Some(hit.attributes.clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert with guardrails: once full, sweep expired entries, then evict if still full.
    pub fn insert(&self, key: &str, attributes: Vec<UserAttribute>) {
        let now = Instant::now();
        let mut w = self.entries.write();
        if w.len() >= self.max_entries && !w.contains_key(key) {
            w.retain(|_, v| v.expires_at > now);
            if w.len() >= self.max_entries {
                // Evict up to 5% of capacity to reduce churn
                let evict_n = self.max_entries / 20 + 1;
                let victims: Vec<String> = w.keys().take(evict_n).cloned().collect();
                for k in victims {
                    if w.remove(&k).is_some() { self.evictions.fetch_add(1, Ordering::Relaxed); }
                }
            }
        }
        w.insert(key.to_string(), CacheEntry { attributes, expires_at: now + self.ttl });
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }
}
