//! Response caching for read-only tools.
//!
//! Avoids repeating identical upstream reads within a short window. Entries
//! are keyed by a call [`fingerprint`] and expire after their TTL. Mutating
//! tools remove them eagerly through glob-pattern
//! [`invalidate`](ResponseCache::invalidate).
//!
//! The cache is an explicit service object: build one per process, share it
//! behind an `Arc`, and hand it to the [`ToolSet`](super::ToolSet). All
//! methods take `&self`; same-key writes are last-write-wins.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use super::core::ToolOutput;
use crate::projection::glob_to_regex;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) > self.ttl
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
}

/// TTL cache of tool outputs, keyed by call fingerprint.
#[derive(Debug)]
pub struct ResponseCache<V = ToolOutput> {
    inner: Mutex<Inner<V>>,
    /// Maximum number of entries before the oldest is evicted.
    max_entries: usize,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a cache holding at most `max_entries` values. A cache of size
    /// zero stores nothing.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            max_entries,
        }
    }

    /// A copy of the live value under `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// [`get`](Self::get) with an explicit clock.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<V> {
        let mut inner = self.lock();
        let live = inner
            .entries
            .get(key)
            .map(|e| (!e.expired_at(now)).then(|| e.value.clone()));
        match live {
            Some(Some(value)) => {
                inner.hits += 1;
                debug!("cache hit: {key}");
                return Some(value);
            }
            Some(None) => {
                inner.entries.remove(key);
                debug!("cache entry expired: {key}");
            }
            None => {}
        }
        inner.misses += 1;
        None
    }

    /// Store a copy of `value` under `key` for `ttl`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.set_at(key, value, ttl, Instant::now());
    }

    /// [`set`](Self::set) with an explicit clock.
    pub fn set_at(&self, key: impl Into<String>, value: V, ttl: Duration, now: Instant) {
        if self.max_entries == 0 {
            return;
        }
        let key = key.into();
        let mut inner = self.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            evict_oldest(&mut inner.entries);
        }
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
            },
        );
    }

    /// Remove every key matching `pattern` (a case-insensitive glob).
    /// Returns how many entries were removed.
    pub fn invalidate(&self, pattern: &str) -> Result<usize, regex::Error> {
        let re = glob_to_regex(pattern)?;
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !re.is_match(key));
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!("invalidated {removed} cache entries matching {pattern}");
        }
        Ok(removed)
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.lock().hits
    }

    pub fn misses(&self) -> u64 {
        self.lock().misses
    }

    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let inner = self.lock();
        let total = inner.hits + inner.misses;
        if total == 0 {
            0.0
        } else {
            inner.hits as f64 / total as f64
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Cache key for a call: tool name plus arguments with sorted keys, so
/// argument order never splits entries.
pub fn fingerprint(tool: &str, args: &Value) -> String {
    format!("{tool}:{}", canonical(args))
}

fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<_> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonical(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

fn evict_oldest<V>(entries: &mut HashMap<String, CacheEntry<V>>) {
    if let Some(oldest) = entries
        .iter()
        .min_by_key(|(_, e)| e.stored_at)
        .map(|(k, _)| k.clone())
    {
        entries.remove(&oldest);
    }
}
