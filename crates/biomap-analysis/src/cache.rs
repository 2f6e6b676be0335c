//! Bounded LRU cache with per-entry TTL.
//!
//! Every mutation, counters included, happens under one mutex. A poisoned lock
//! is reported as a [`CacheError`] internally and degrades to a miss.

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use biomap_core::models::{AnalysisOptions, AnalysisRequest};
use biomap_core::CacheError;
use lru::LruCache;
use serde::Serialize;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.created_at + self.ttl
    }
}

/// Snapshot of the cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate_percent: f64,
    pub total_requests: u64,
}

struct Inner<K: Hash + Eq, V> {
    entries: LruCache<K, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub struct ResultCache<K: Hash + Eq, V> {
    name: String,
    default_ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Hash + Eq, V> fmt::Debug for ResultCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> ResultCache<K, V> {
    /// A capacity of zero is raised to one.
    pub fn new(name: impl Into<String>, capacity: usize, default_ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: name.into(),
            default_ttl,
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner<K, V>>, CacheError> {
        self.inner.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Live value for `key`, refreshing its recency. Expired entries are
    /// dropped here.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<V> {
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(cache = %self.name, error = %e, "Cache read skipped, treating as miss");
                return None;
            }
        };
        let inner = &mut *guard;

        let expired = match inner.entries.peek(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                inner.misses += 1;
                return None;
            }
        };

        if expired {
            inner.entries.pop(key);
            inner.misses += 1;
            tracing::debug!(cache = %self.name, "Expired entry purged");
            return None;
        }

        inner.hits += 1;
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store with the default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.set(key, value, self.default_ttl);
    }

    /// Store `value`. At capacity the least recently used entry goes first;
    /// replacing an existing key does not count as an eviction.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let mut guard = match self.lock() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::warn!(cache = %self.name, error = %e, "Cache write skipped");
                return;
            }
        };
        let inner = &mut *guard;

        let entry = CacheEntry {
            value,
            created_at: Instant::now(),
            ttl,
        };
        if inner.entries.contains(&key) {
            inner.entries.put(key, entry);
        } else if inner.entries.push(key, entry).is_some() {
            inner.evictions += 1;
        }
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        match self.lock() {
            Ok(mut inner) => inner.entries.pop(key).map(|entry| entry.value),
            Err(e) => {
                tracing::warn!(cache = %self.name, error = %e, "Cache remove skipped");
                None
            }
        }
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&self) {
        match self.lock() {
            Ok(mut inner) => {
                inner.entries.clear();
                inner.hits = 0;
                inner.misses = 0;
                inner.evictions = 0;
            }
            Err(e) => tracing::warn!(cache = %self.name, error = %e, "Cache clear skipped"),
        }
    }

    /// Remove all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Instant::now())
    }

    fn cleanup_expired_at(&self, now: Instant) -> usize {
        let mut inner = match self.lock() {
            Ok(inner) => inner,
            Err(e) => {
                tracing::warn!(cache = %self.name, error = %e, "Cache cleanup skipped");
                return 0;
            }
        };

        let expired: Vec<K> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            inner.entries.pop(key);
        }

        if !expired.is_empty() {
            tracing::debug!(cache = %self.name, removed = expired.len(), "Expired entries cleaned up");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let Ok(inner) = self.lock() else {
            return CacheStats {
                size: 0,
                capacity: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
                hit_rate_percent: 0.0,
                total_requests: 0,
            };
        };

        let total_requests = inner.hits + inner.misses;
        let hit_rate_percent = if total_requests > 0 {
            (inner.hits as f64 / total_requests as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        CacheStats {
            size: inner.entries.len(),
            capacity: inner.entries.cap().get(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            hit_rate_percent,
            total_requests,
        }
    }
}

/// Quantized identity of an analysis request.
///
/// Coordinates are kept to 1e-4 degrees (about 11 m) and the radius to 0.1 km,
/// so near-duplicate requests share one slot. The section toggles are part of
/// the key because they change the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnalysisCacheKey {
    lat_e4: i64,
    lng_e4: i64,
    radius_e1: i64,
    options: AnalysisOptions,
}

impl AnalysisCacheKey {
    pub fn from_request(request: &AnalysisRequest) -> Self {
        Self {
            lat_e4: (request.point.lat * 1e4).round() as i64,
            lng_e4: (request.point.lng * 1e4).round() as i64,
            radius_e1: (request.radius_km * 10.0).round() as i64,
            options: request.options,
        }
    }
}

impl fmt::Display for AnalysisCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "proximity:{:.4}:{:.4}:{:.1}:{}",
            self.lat_e4 as f64 / 1e4,
            self.lng_e4 as f64 / 1e4,
            self.radius_e1 as f64 / 10.0,
            self.options.flags()
        )
    }
}
