//! Bounded TTL response cache.
//!
//! [`ResponseCache`] stores rendered answers keyed on `(identity,
//! fingerprint)`, so a user repeating a question within the TTL gets the
//! earlier answer without another backend call. Keys include the identity:
//! answers are personalised by plan and conversation, and one user's answer
//! must never be served to another.
//!
//! # Eviction
//!
//! - **Expiry** is lazy. An entry whose age has reached its TTL is removed
//!   when it is next read (or by [`ResponseCache::purge_expired`]).
//! - **Capacity** is strict. Inserting a new key into a full cache first
//!   removes exactly one entry, the one created earliest. Overwriting an
//!   existing key replaces it in place and evicts nothing.
//!
//! An insertion index ordered by `(created_at, sequence)` sits next to the
//! entry map so the oldest entry is found without a scan. Both live behind
//! one mutex, which makes check-then-evict-then-insert atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::elapsed;
use crate::telemetry;
use crate::types::Fingerprint;

/// Configuration for the response cache.
///
/// ```rust
/// # use tollgate::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(1_000)
///     .ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 100.
    pub max_entries: usize,
    /// Time-to-live for cached entries. Default: 5 minutes.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100,
            ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    /// Create a new config with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Entries currently stored, including expired ones not yet purged.
    pub size: usize,
    pub capacity: usize,
    pub ttl: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    identity: String,
    fingerprint: Fingerprint,
}

impl CacheKey {
    fn new(identity: &str, fingerprint: Fingerprint) -> Self {
        Self {
            identity: identity.to_owned(),
            fingerprint,
        }
    }
}

/// Position in the insertion index. The sequence number breaks ties between
/// entries created at the same instant.
type Age = (DateTime<Utc>, u64);

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: DateTime<Utc>,
    ttl: Duration,
    seq: u64,
}

impl<V> CacheEntry<V> {
    fn age(&self) -> Age {
        (self.created_at, self.seq)
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        elapsed(self.created_at, now) < self.ttl
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    by_age: BTreeMap<Age, CacheKey>,
    next_seq: u64,
}

impl<V> Inner<V> {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.by_age.remove(&entry.age());
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        let (_, key) = self.by_age.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// In-memory response cache with per-entry TTL and oldest-first eviction.
///
/// Values are opaque to the cache; lookups return clones, so wrap large
/// payloads in an `Arc`.
#[derive(Debug)]
pub struct ResponseCache<V> {
    config: CacheConfig,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> ResponseCache<V> {
    /// Create an empty cache.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            config: *config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                by_age: BTreeMap::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a fresh entry.
    ///
    /// Returns `None` on miss. An entry found stale is removed.
    pub fn get(&self, identity: &str, fingerprint: Fingerprint, now: DateTime<Utc>) -> Option<V> {
        let key = CacheKey::new(identity, fingerprint);
        let mut inner = self.lock();

        let fresh = inner.entries.get(&key).map(|entry| entry.is_fresh(now));
        match fresh {
            Some(true) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                inner.entries.get(&key).map(|entry| entry.value.clone())
            }
            Some(false) => {
                inner.remove(&key);
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "expired")
                    .increment(1);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                debug!(identity, %fingerprint, "evicted stale cache entry on read");
                None
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Insert or overwrite an entry with the configured TTL.
    pub fn insert(&self, identity: &str, fingerprint: Fingerprint, value: V, now: DateTime<Utc>) {
        self.insert_with_ttl(identity, fingerprint, value, self.config.ttl, now);
    }

    /// Insert or overwrite an entry with its own TTL.
    ///
    /// A cache configured with zero capacity stores nothing.
    pub fn insert_with_ttl(
        &self,
        identity: &str,
        fingerprint: Fingerprint,
        value: V,
        ttl: Duration,
        now: DateTime<Utc>,
    ) {
        if self.config.max_entries == 0 {
            return;
        }
        let key = CacheKey::new(identity, fingerprint);
        let mut inner = self.lock();

        let overwrite = inner.remove(&key).is_some();
        if !overwrite && inner.entries.len() >= self.config.max_entries {
            if let Some(evicted) = inner.evict_oldest() {
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "capacity")
                    .increment(1);
                debug!(
                    identity = %evicted.identity,
                    fingerprint = %evicted.fingerprint,
                    "evicted oldest cache entry at capacity"
                );
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        let entry = CacheEntry {
            value,
            created_at: now,
            ttl,
            seq,
        };
        inner.by_age.insert(entry.age(), key.clone());
        inner.entries.insert(key, entry);
    }

    /// Remove one entry. Returns whether it was present.
    pub fn invalidate(&self, identity: &str, fingerprint: Fingerprint) -> bool {
        self.lock()
            .remove(&CacheKey::new(identity, fingerprint))
            .is_some()
    }

    /// Remove every entry whose TTL has elapsed. Returns how many were
    /// removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.lock();
        let stale: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_fresh(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            inner.remove(key);
        }
        if !stale.is_empty() {
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "reason" => "expired")
                .increment(stale.len() as u64);
        }
        stale.len()
    }

    /// Evict all entries.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.by_age.clear();
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.config.max_entries,
            ttl: self.config.ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn fp(n: u64) -> Fingerprint {
        Fingerprint::from_raw(n)
    }

    #[test]
    fn index_tracks_entries() {
        let cache = ResponseCache::new(&CacheConfig::new().max_entries(3));
        let now = Utc::now();
        cache.insert("u", fp(1), "a", now);
        cache.insert("u", fp(2), "b", now);
        cache.insert("u", fp(1), "c", now);
        cache.invalidate("u", fp(2));

        let inner = cache.lock();
        assert_eq!(inner.entries.len(), 1);
        assert_eq!(inner.by_age.len(), 1);
        assert_eq!(inner.entries[&CacheKey::new("u", fp(1))].value, "c");
    }

    #[test]
    fn overwrite_moves_entry_to_newest() {
        let cache = ResponseCache::new(&CacheConfig::new().max_entries(2));
        let t0 = Utc::now();
        cache.insert("u", fp(1), 1, t0);
        cache.insert("u", fp(2), 2, t0 + TimeDelta::seconds(1));
        cache.insert("u", fp(1), 10, t0 + TimeDelta::seconds(2));
        cache.insert("u", fp(3), 3, t0 + TimeDelta::seconds(3));

        let now = t0 + TimeDelta::seconds(4);
        assert_eq!(cache.get("u", fp(1), now), Some(10));
        assert_eq!(cache.get("u", fp(2), now), None);
        assert_eq!(cache.get("u", fp(3), now), Some(3));
    }

    #[test]
    fn zero_capacity_stores_nothing() {
        let cache = ResponseCache::new(&CacheConfig::new().max_entries(0));
        cache.insert("u", fp(1), "a", Utc::now());
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_removes_only_stale() {
        let cache = ResponseCache::new(&CacheConfig::new().ttl(Duration::from_secs(10)));
        let t0 = Utc::now();
        cache.insert("u", fp(1), "old", t0);
        cache.insert("u", fp(2), "new", t0 + TimeDelta::seconds(5));

        assert_eq!(cache.purge_expired(t0 + TimeDelta::seconds(10)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lock().by_age.len(), 1);
    }
}
