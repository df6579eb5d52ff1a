//! Store-adapter boundary.
//!
//! [`EntityStore`] is the only way the services reach a backing system.
//! Every call goes through [`fetch_view`] / [`write_view`], which bound it
//! with `tokio::time::timeout`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crossmap_core::types::{EntityView, Payload, SystemId};
use tokio::sync::RwLock;

use crate::error::SyncError;

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// The view `system` holds for `entity_id`, or `None` if it has none.
    async fn fetch(&self, system: &SystemId, entity_id: &str)
        -> Result<Option<EntityView>, SyncError>;

    /// Replace the fields `system` holds for `entity_id`.
    async fn write(
        &self,
        system: &SystemId,
        entity_id: &str,
        fields: Payload,
    ) -> Result<(), SyncError>;
}

/// Fetch a view under `timeout`, mapping a missing view to
/// [`SyncError::ViewNotFound`].
pub async fn fetch_view(
    store: &dyn EntityStore,
    system: &SystemId,
    entity_id: &str,
    timeout: Duration,
) -> Result<EntityView, SyncError> {
    match tokio::time::timeout(timeout, store.fetch(system, entity_id)).await {
        Ok(Ok(Some(view))) => Ok(view),
        Ok(Ok(None)) => Err(SyncError::ViewNotFound {
            system: system.clone(),
            entity_id: entity_id.to_string(),
        }),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(SyncError::StoreTimeout {
            system: system.clone(),
            operation: "fetch",
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

/// Write a view's fields under `timeout`.
pub async fn write_view(
    store: &dyn EntityStore,
    system: &SystemId,
    entity_id: &str,
    fields: Payload,
    timeout: Duration,
) -> Result<(), SyncError> {
    match tokio::time::timeout(timeout, store.write(system, entity_id, fields)).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::StoreTimeout {
            system: system.clone(),
            operation: "write",
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Process-local store keyed by `(system, entity_id)`.
///
/// Used by the sweep binary and tests. Writes to a system can be made to
/// fail, and every call can be delayed, to exercise the failure paths.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    views: HashMap<(SystemId, String), EntityView>,
    failing_writes: HashSet<SystemId>,
    latency: Option<Duration>,
    writes: u64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, entity_id: &str, view: EntityView) {
        let mut state = self.inner.write().await;
        state
            .views
            .insert((view.system.clone(), entity_id.to_string()), view);
    }

    pub async fn get(&self, system: &SystemId, entity_id: &str) -> Option<EntityView> {
        let state = self.inner.read().await;
        state
            .views
            .get(&(system.clone(), entity_id.to_string()))
            .cloned()
    }

    /// Make every write to `system` fail with [`SyncError::Store`].
    pub async fn fail_writes_to(&self, system: SystemId) {
        self.inner.write().await.failing_writes.insert(system);
    }

    /// Delay every fetch and write by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.inner.write().await.latency = latency;
    }

    /// Number of successful writes so far.
    pub async fn write_count(&self) -> u64 {
        self.inner.read().await.writes
    }

    async fn delay(&self) {
        let latency = self.inner.read().await.latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn fetch(
        &self,
        system: &SystemId,
        entity_id: &str,
    ) -> Result<Option<EntityView>, SyncError> {
        self.delay().await;
        Ok(self.get(system, entity_id).await)
    }

    async fn write(
        &self,
        system: &SystemId,
        entity_id: &str,
        fields: Payload,
    ) -> Result<(), SyncError> {
        self.delay().await;
        let mut state = self.inner.write().await;
        if state.failing_writes.contains(system) {
            return Err(SyncError::Store {
                system: system.clone(),
                message: format!("write rejected for {entity_id}"),
            });
        }
        let key = (system.clone(), entity_id.to_string());
        let view = state.views.get_mut(&key).ok_or_else(|| SyncError::ViewNotFound {
            system: system.clone(),
            entity_id: entity_id.to_string(),
        })?;
        view.fields = fields;
        state.writes += 1;
        Ok(())
    }
}
