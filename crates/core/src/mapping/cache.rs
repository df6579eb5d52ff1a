//! Bounded mapping-result cache keyed by `(MapperKey, payload fingerprint)`.
//!
//! Least-recently-used entries are evicted first. The clock is passed in by
//! the caller so expiry is testable without sleeping.

use std::num::NonZeroUsize;

use chrono::Duration;
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::types::{MapperKey, Payload, Timestamp};

/// Default number of cached mapping results.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Default entry lifetime in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Point-in-time cache counters. Hits, misses and evictions are lifetime
/// counters and survive [`MappingCache::clear`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct CacheEntry {
    output: Payload,
    inserted_at: Timestamp,
}

#[derive(Debug)]
pub struct MappingCache {
    entries: LruCache<(MapperKey, String), CacheEntry>,
    ttl: Option<Duration>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl MappingCache {
    /// `capacity` is clamped to at least one entry; a `ttl` of `None` keeps
    /// entries until evicted by capacity or cleared.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    /// Build from the settings form, where a TTL of 0 seconds disables expiry.
    pub fn with_ttl_secs(capacity: usize, ttl_secs: u64) -> Self {
        let ttl = (ttl_secs > 0).then(|| Duration::seconds(ttl_secs.min(u32::MAX as u64) as i64));
        Self::new(capacity, ttl)
    }

    /// Look up a cached output, counting a hit or a miss. Expired entries are
    /// dropped and count as an eviction plus a miss.
    pub fn get(&mut self, key: &MapperKey, fingerprint: &str, now: Timestamp) -> Option<Payload> {
        let lookup = (key.clone(), fingerprint.to_string());
        let ttl = self.ttl;
        let expired = match self.entries.get(&lookup) {
            Some(entry) if !is_expired(ttl, entry, now) => {
                let output = entry.output.clone();
                self.hits += 1;
                return Some(output);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.pop(&lookup);
            self.evictions += 1;
        }
        self.misses += 1;
        None
    }

    /// Store a mapping output, evicting the least recently used entry when
    /// full.
    pub fn insert(&mut self, key: MapperKey, fingerprint: String, output: Payload, now: Timestamp) {
        let lookup = (key, fingerprint);
        if !self.entries.contains(&lookup) && self.entries.len() >= self.capacity() {
            self.evictions += 1;
        }
        self.entries.put(
            lookup,
            CacheEntry {
                output,
                inserted_at: now,
            },
        );
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

fn is_expired(ttl: Option<Duration>, entry: &CacheEntry, now: Timestamp) -> bool {
    ttl.is_some_and(|ttl| now - entry.inserted_at >= ttl)
}

impl Default for MappingCache {
    fn default() -> Self {
        Self::with_ttl_secs(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS)
    }
}
