//! One concurrent repair pass over a batch of entities.

use futures::future::join_all;
use serde::Deserialize;

use crossmap_core::repair::RepairResult;
use crossmap_core::types::EntityView;

use crate::context::SyncContext;
use crate::error::SyncError;
use crate::store::InMemoryStore;

/// Both views of one entity, as read from a sweep fixture.
#[derive(Debug, Clone, Deserialize)]
pub struct SweepEntry {
    pub entity_id: String,
    pub authoritative: EntityView,
    pub replica: EntityView,
}

/// Outcome of one entity's pass.
#[derive(Debug)]
pub struct SweepOutcome {
    pub entity_id: String,
    pub result: Result<RepairResult, SyncError>,
}

/// Parse a fixture: a JSON array of [`SweepEntry`].
pub fn parse_fixture(raw: &str) -> Result<Vec<SweepEntry>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Load every entry's views into `store`. Returns the entity ids in
/// fixture order.
pub async fn seed(store: &InMemoryStore, entries: Vec<SweepEntry>) -> Vec<String> {
    let mut ids = Vec::with_capacity(entries.len());
    for entry in entries {
        store.insert(&entry.entity_id, entry.authoritative).await;
        store.insert(&entry.entity_id, entry.replica).await;
        ids.push(entry.entity_id);
    }
    ids
}

/// Repair every id concurrently. A failing entity does not stop the others.
pub async fn run(ctx: &SyncContext, entity_ids: &[String]) -> Vec<SweepOutcome> {
    let passes = entity_ids.iter().map(|entity_id| async move {
        let result = ctx.repair.detect_and_repair_inconsistencies(entity_id).await;
        if let Err(e) = &result {
            tracing::warn!(entity_id = %entity_id, error = %e, "Repair pass failed");
        }
        SweepOutcome {
            entity_id: entity_id.clone(),
            result,
        }
    });
    join_all(passes).await
}
