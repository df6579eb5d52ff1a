//! Async mapping service: registry resolution plus the fingerprint cache.

use chrono::Utc;
use crossmap_core::hashing::fingerprint;
use crossmap_core::mapping::{CacheStats, MapperRegistry, MappingCache};
use crossmap_core::types::{MapperKey, Payload, SystemId};
use tokio::sync::Mutex;

use crate::error::SyncError;

/// Resolves mappers and caches their output.
///
/// The registry and the cache each sit behind their own lock. A mapper runs
/// with no lock held; two callers racing on the same uncached payload both
/// map it and the second insert overwrites the first with an equal value.
#[derive(Debug)]
pub struct MappingService {
    registry: Mutex<MapperRegistry>,
    cache: Mutex<MappingCache>,
}

impl MappingService {
    pub fn new(registry: MapperRegistry, cache: MappingCache) -> Self {
        Self {
            registry: Mutex::new(registry),
            cache: Mutex::new(cache),
        }
    }

    /// Map `payload` from `source`'s shape into `target`'s.
    ///
    /// Served from the cache when the same payload was mapped before for the
    /// same direction. On a registry miss the fallback mapper is registered
    /// under the key first.
    pub async fn map_data(
        &self,
        source: &SystemId,
        target: &SystemId,
        payload: &Payload,
    ) -> Result<Payload, SyncError> {
        let key = MapperKey::new(source.clone(), target.clone());
        let fp = fingerprint(payload);

        if let Some(hit) = self.cache.lock().await.get(&key, &fp, Utc::now()) {
            tracing::debug!(mapper_key = %key, "Mapping cache hit");
            return Ok(hit);
        }

        let mapper = {
            let mut registry = self.registry.lock().await;
            let fallback = !registry.contains(&key);
            let mapper = registry.resolve(&key)?;
            if fallback {
                tracing::info!(
                    mapper_key = %key,
                    mapper = mapper.name(),
                    "Registered fallback mapper",
                );
            }
            mapper
        };

        let output = mapper.map(&key, payload).inspect_err(|e| {
            tracing::warn!(mapper_key = %key, error = %e, "Mapping failed");
        })?;

        self.cache
            .lock()
            .await
            .insert(key, fp, output.clone(), Utc::now());
        Ok(output)
    }

    /// Map `payload`, which is in `target`'s shape, back into `source`'s.
    ///
    /// Resolves the `(target, source)` mapper with the same fallback rule as
    /// [`MappingService::map_data`]. Results are not cached.
    pub async fn reverse_map_data(
        &self,
        source: &SystemId,
        target: &SystemId,
        payload: &Payload,
    ) -> Result<Payload, SyncError> {
        let key = MapperKey::new(source.clone(), target.clone());
        let mapper = self.registry.lock().await.resolve_inverse(&key)?;
        let output = mapper.map(&key.inverse(), payload).inspect_err(|e| {
            tracing::warn!(mapper_key = %key.inverse(), error = %e, "Reverse mapping failed");
        })?;
        Ok(output)
    }

    pub async fn get_cache_stats(&self) -> CacheStats {
        self.cache.lock().await.stats()
    }

    /// Drop every cached result. Hit and miss counters are kept.
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.lock().await;
        let dropped = cache.len();
        cache.clear();
        tracing::info!(dropped, "Mapping cache cleared");
    }

    /// Registered mapper keys, sorted.
    pub async fn mapper_keys(&self) -> Vec<MapperKey> {
        self.registry.lock().await.keys()
    }
}

impl Default for MappingService {
    fn default() -> Self {
        Self::new(MapperRegistry::new(), MappingCache::default())
    }
}
