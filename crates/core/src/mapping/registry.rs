//! Keyed table of directional mappers.

use std::collections::HashMap;
use std::sync::Arc;

use super::{AliasMapper, LoomaToZervigo, Mapper, ZervigoToLooma};
use crate::error::CoreError;
use crate::types::{MapperKey, SystemId};

/// Mappers keyed by `(source, target)`.
///
/// A registry built with [`MapperRegistry::new`] carries a pre-built fallback
/// mapper. On a lookup miss, [`MapperRegistry::resolve`] registers that same
/// shared instance under the missing key, so later lookups hit it directly
/// and the fallback is never built twice.
#[derive(Debug, Clone)]
pub struct MapperRegistry {
    mappers: HashMap<MapperKey, Arc<dyn Mapper>>,
    fallback: Option<Arc<dyn Mapper>>,
}

impl MapperRegistry {
    /// Registry with the built-in Zervigo ⇄ Looma CRM mappers and the alias
    /// fallback.
    pub fn new() -> Self {
        let mut registry = Self::strict();
        registry.fallback = Some(Arc::new(AliasMapper));
        registry
    }

    /// Registry with the built-in mappers and no fallback. Unregistered keys
    /// fail instead of being synthesized.
    pub fn strict() -> Self {
        let mut registry = Self {
            mappers: HashMap::new(),
            fallback: None,
        };
        registry.register(
            MapperKey::new(SystemId::Zervigo, SystemId::LoomaCrm),
            Arc::new(ZervigoToLooma),
        );
        registry.register(
            MapperKey::new(SystemId::LoomaCrm, SystemId::Zervigo),
            Arc::new(LoomaToZervigo),
        );
        registry
    }

    /// Add or replace the mapper for `key`.
    pub fn register(&mut self, key: MapperKey, mapper: Arc<dyn Mapper>) {
        self.mappers.insert(key, mapper);
    }

    pub fn get(&self, key: &MapperKey) -> Option<Arc<dyn Mapper>> {
        self.mappers.get(key).cloned()
    }

    pub fn contains(&self, key: &MapperKey) -> bool {
        self.mappers.contains_key(key)
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Whether `key` is currently served by the shared fallback instance.
    pub fn is_fallback(&self, key: &MapperKey) -> bool {
        match (self.mappers.get(key), &self.fallback) {
            (Some(mapper), Some(fallback)) => Arc::ptr_eq(mapper, fallback),
            _ => false,
        }
    }

    /// The mapper for `key`, registering the fallback under it on a miss.
    pub fn resolve(&mut self, key: &MapperKey) -> Result<Arc<dyn Mapper>, CoreError> {
        if let Some(mapper) = self.get(key) {
            return Ok(mapper);
        }
        let fallback = self
            .fallback
            .clone()
            .ok_or_else(|| CoreError::MapperNotFound { key: key.clone() })?;
        self.mappers.insert(key.clone(), Arc::clone(&fallback));
        Ok(fallback)
    }

    /// The mapper for the inverse of `key`, with the same fallback rule.
    ///
    /// Fails with [`CoreError::MapperNotInvertible`] on a strict registry
    /// with nothing registered for the inverse direction.
    pub fn resolve_inverse(&mut self, key: &MapperKey) -> Result<Arc<dyn Mapper>, CoreError> {
        self.resolve(&key.inverse())
            .map_err(|_| CoreError::MapperNotInvertible { key: key.clone() })
    }

    /// Registered keys, sorted by their display form.
    pub fn keys(&self) -> Vec<MapperKey> {
        let mut keys: Vec<MapperKey> = self.mappers.keys().cloned().collect();
        keys.sort_by_key(|k| k.to_string());
        keys
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::new()
    }
}
