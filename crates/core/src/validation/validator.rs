//! Entry point combining the schema pass and the business rules.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::business::evaluate_business_rules;
use super::cache::{ValidationCache, DEFAULT_VALIDATION_CACHE_CAPACITY};
use super::evaluator::evaluate_schema;
use super::rules::ValidationResult;
use crate::error::CoreError;
use crate::hashing::fingerprint;
use crate::mapping::CacheStats;
use crate::schema::SchemaRegistry;
use crate::types::{EntityView, Payload};

/// Validates entity instances against a [`SchemaRegistry`].
///
/// Results are cached by payload fingerprint. Clones share the cache.
#[derive(Debug, Clone)]
pub struct Validator {
    schemas: SchemaRegistry,
    cache: Arc<Mutex<ValidationCache>>,
}

impl Validator {
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self::with_cache_capacity(schemas, DEFAULT_VALIDATION_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(schemas: SchemaRegistry, capacity: usize) -> Self {
        Self {
            schemas,
            cache: Arc::new(Mutex::new(ValidationCache::new(capacity))),
        }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    /// Run the structural pass for `entity_type`, then the business rules.
    ///
    /// Fails only when the entity type has no registered schema; every rule
    /// violation is reported inside the returned [`ValidationResult`].
    pub fn validate(
        &self,
        entity_type: &str,
        instance: &Payload,
    ) -> Result<ValidationResult, CoreError> {
        let schema = self.schemas.get_schema(entity_type)?;
        let key = fingerprint(instance);
        if let Some(cached) = self.lock_cache().get(entity_type, &key) {
            return Ok(cached);
        }

        let mut result = evaluate_schema(schema, instance);
        result.merge(evaluate_business_rules(instance));
        self.lock_cache().insert(entity_type, key, result.clone());
        Ok(result)
    }

    pub fn validate_view(&self, view: &EntityView) -> Result<ValidationResult, CoreError> {
        self.validate(&view.entity_type, &view.fields)
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock_cache().stats()
    }

    // A panic while holding the lock cannot leave a half-written entry.
    fn lock_cache(&self) -> MutexGuard<'_, ValidationCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(SchemaRegistry::with_builtin())
    }
}
