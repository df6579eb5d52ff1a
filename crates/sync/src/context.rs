//! Explicitly constructed service graph.
//!
//! One [`SyncContext`] per process (or per test) owns the mapping and repair
//! services and the store they talk to. Nothing is global.

use std::sync::Arc;

use crossmap_core::mapping::{CacheStats, MapperRegistry, MappingCache};
use crossmap_core::repair::RepairStats;
use crossmap_core::validation::Validator;
use serde::Serialize;

use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::mapping::MappingService;
use crate::repair::RepairService;
use crate::store::EntityStore;

#[derive(Clone)]
pub struct SyncContext {
    pub settings: SyncSettings,
    pub mapping: Arc<MappingService>,
    pub repair: Arc<RepairService>,
    pub store: Arc<dyn EntityStore>,
}

/// Point-in-time counters for external reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub repair: RepairStats,
    pub cache: CacheStats,
}

impl SyncContext {
    /// Build the services from `settings`, rejecting invalid settings.
    pub fn new(settings: SyncSettings, store: Arc<dyn EntityStore>) -> Result<Self, SyncError> {
        settings.check()?;

        let cache = MappingCache::with_ttl_secs(settings.cache_capacity, settings.cache_ttl_secs);
        let mapping = Arc::new(MappingService::new(MapperRegistry::new(), cache));
        let repair = Arc::new(RepairService::new(
            &settings,
            Arc::clone(&mapping),
            Validator::default(),
            Arc::clone(&store),
        ));

        tracing::info!(
            authoritative = %settings.authoritative_system,
            replica = %settings.replica_system,
            cache_capacity = settings.cache_capacity,
            auto_repair = settings.auto_repair_enabled,
            "Sync context ready",
        );

        Ok(Self {
            settings,
            mapping,
            repair,
            store,
        })
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            repair: self.repair.repair_statistics().await,
            cache: self.mapping.get_cache_stats().await,
        }
    }
}
