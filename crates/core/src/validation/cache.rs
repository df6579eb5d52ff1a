//! Validation results keyed by `(entity type, payload fingerprint)`.
//!
//! A result depends only on the schema and the payload, so entries never
//! expire. Least-recently-used entries are evicted when full.

use std::num::NonZeroUsize;

use lru::LruCache;

use super::rules::ValidationResult;
use crate::mapping::CacheStats;

/// Default number of cached validation results.
pub const DEFAULT_VALIDATION_CACHE_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct ValidationCache {
    entries: LruCache<(String, String), ValidationResult>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl ValidationCache {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    pub fn get(&mut self, entity_type: &str, fingerprint: &str) -> Option<ValidationResult> {
        let lookup = (entity_type.to_string(), fingerprint.to_string());
        match self.entries.get(&lookup) {
            Some(result) => {
                let result = result.clone();
                self.hits += 1;
                Some(result)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, entity_type: &str, fingerprint: String, result: ValidationResult) {
        let lookup = (entity_type.to_string(), fingerprint);
        if !self.entries.contains(&lookup) && self.entries.len() >= self.entries.cap().get() {
            self.evictions += 1;
        }
        self.entries.put(lookup, result);
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

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
        }
    }
}

impl Default for ValidationCache {
    fn default() -> Self {
        Self::new(DEFAULT_VALIDATION_CACHE_CAPACITY)
    }
}
