//! Integration tests for the repair flow over an in-memory store.
//!
//! Each test builds its own [`SyncContext`], seeds both views of one or more
//! entities, and drives full DETECTING → RECORDED passes.

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::{json, Value};

use crossmap_core::consistency::IssueKind;
use crossmap_core::repair::{RepairAction, RepairStatus};
use crossmap_core::types::{EntityView, Payload, SystemId};
use crossmap_sync::{sweep, InMemoryStore, SyncContext, SyncError, SyncSettings};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap_or_default()
}

fn user(id: u64, overrides: Value) -> EntityView {
    let mut fields = payload(json!({
        "id": id,
        "username": "test_user",
        "email": "test@example.com",
        "role": "user",
        "status": "active",
        "created_at": "2025-09-23T10:00:00Z",
        "updated_at": "2025-09-23T10:00:00Z"
    }));
    fields.extend(payload(overrides));
    EntityView::new(SystemId::Zervigo, "zervigo_user", fields)
}

fn talent(id: u64, overrides: Value) -> EntityView {
    let mut fields = payload(json!({
        "id": format!("talent_{id}"),
        "name": "test_user",
        "email": "test@example.com",
        "skills": ["Python"],
        "status": "active",
        "zervigo_user_id": id,
        "created_at": "2025-09-23T10:00:00Z",
        "updated_at": "2025-09-23T10:00:00Z"
    }));
    fields.extend(payload(overrides));
    EntityView::new(SystemId::LoomaCrm, "looma_talent", fields)
}

fn context_with(store: &InMemoryStore, settings: SyncSettings) -> SyncContext {
    SyncContext::new(settings, Arc::new(store.clone())).expect("default settings are valid")
}

async fn seed(store: &InMemoryStore, id: u64, auth: EntityView, replica: EntityView) {
    let entity_id = format!("talent_{id}");
    store.insert(&entity_id, auth).await;
    store.insert(&entity_id, replica).await;
}

// ---------------------------------------------------------------------------
// Test: auto-fix of a low-severity mismatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn low_severity_mismatch_is_repaired_on_the_replica() {
    let store = InMemoryStore::new();
    seed(&store, 1, user(1, json!({})), talent(1, json!({"name": "Old Name"}))).await;
    let ctx = context_with(&store, SyncSettings::default());

    let result = ctx
        .repair
        .detect_and_repair_inconsistencies("talent_1")
        .await
        .unwrap();

    assert!(result.repair_success);
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].field, "name");
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].status(), RepairStatus::Applied);
    assert_eq!(result.records[0].action(), RepairAction::PatchReplica);

    let replica = store.get(&SystemId::LoomaCrm, "talent_1").await.unwrap();
    assert_eq!(replica.fields["name"], json!("test_user"));
    assert_eq!(replica.fields["skills"], json!(["Python"]));

    let stats = ctx.repair.repair_statistics().await;
    assert_eq!(stats.total_repairs, 1);
    assert_eq!(stats.successful_repairs, 1);
    assert_eq!(stats.success_rate, 1.0);
}

/// A second pass after a successful repair finds nothing left to do.
#[tokio::test]
async fn repaired_entity_is_consistent_on_the_next_pass() {
    let store = InMemoryStore::new();
    seed(&store, 1, user(1, json!({})), talent(1, json!({"name": "Old Name"}))).await;
    let ctx = context_with(&store, SyncSettings::default());

    ctx.repair
        .detect_and_repair_inconsistencies("talent_1")
        .await
        .unwrap();
    let second = ctx
        .repair
        .detect_and_repair_inconsistencies("talent_1")
        .await
        .unwrap();

    assert!(second.issues.is_empty());
    assert!(second.repair_success);
}

/// A replica pointing at a different Zervigo user is never patched.
#[tokio::test]
async fn wrong_user_link_is_left_for_manual_intervention() {
    let store = InMemoryStore::new();
    seed(&store, 1, user(1, json!({})), talent(1, json!({"zervigo_user_id": 999}))).await;
    let ctx = context_with(&store, SyncSettings::default());

    let result = ctx
        .repair
        .detect_and_repair_inconsistencies("talent_1")
        .await
        .unwrap();

    assert!(!result.repair_success);
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].field, "zervigo_user_id");
    assert_eq!(result.issues[0].left_value, Some(json!(1)));
    assert_eq!(result.records[0].status(), RepairStatus::Skipped);
    assert_eq!(result.records[0].action(), RepairAction::ManualIntervention);
    assert_eq!(store.write_count().await, 0);
}

// ---------------------------------------------------------------------------
// Test: auto-repair disabled
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disabled_auto_repair_records_a_skip() {
    let store = InMemoryStore::new();
    seed(&store, 1, user(1, json!({})), talent(1, json!({"name": "Old Name"}))).await;
    let ctx = context_with(&store, SyncSettings::default());
    ctx.repair.set_auto_repair(false);

    let result = ctx
        .repair
        .detect_and_repair_inconsistencies("talent_1")
        .await
        .unwrap();

    assert!(!result.repair_success);
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].status(), RepairStatus::Skipped);
    assert_eq!(result.records[0].action(), RepairAction::NoAction);
    assert_eq!(store.write_count().await, 0);

    let stats = ctx.repair.repair_statistics().await;
    assert_eq!(stats.total_repairs, 0);
    assert_eq!(stats.skipped_repairs, 1);
}

#[tokio::test]
async fn disabled_through_settings_matches_the_toggle() {
    let store = InMemoryStore::new();
    seed(&store, 1, user(1, json!({})), talent(1, json!({"name": "Old Name"}))).await;
    let settings = SyncSettings {
        auto_repair_enabled: false,
        ..SyncSettings::default()
    };
    let ctx = context_with(&store, settings);

    let result = ctx
        .repair
        .detect_and_repair_inconsistencies("talent_1")
        .await
        .unwrap();
    assert_eq!(result.count(RepairStatus::Skipped), 1);
}

// ---------------------------------------------------------------------------
// Test: failure isolation
// ---------------------------------------------------------------------------

/// A failed write is recorded and the remaining issues are still processed.
#[tokio::test]
async fn failed_write_does_not_stop_the_pass() {
    let store = InMemoryStore::new();
    seed(
        &store,
        1,
        user(1, json!({})),
        talent(
            1,
            json!({"name": "Old Name", "updated_at": "2025-09-23T12:00:00Z"}),
        ),
    )
    .await;
    store.fail_writes_to(SystemId::LoomaCrm).await;
    let ctx = context_with(&store, SyncSettings::default());

    let result = ctx
        .repair
        .detect_and_repair_inconsistencies("talent_1")
        .await
        .unwrap();

    assert_eq!(result.issues.len(), 2);
    assert_eq!(result.issues[0].kind, IssueKind::StaleTimestamp);
    assert_eq!(result.count(RepairStatus::Applied), 1);
    assert_eq!(result.count(RepairStatus::Failed), 1);
    assert!(!result.repair_success);

    let failed = result
        .records
        .iter()
        .find(|r| r.status() == RepairStatus::Failed)
        .unwrap();
    assert_eq!(failed.issue().field, "name");
    assert!(failed.detail().is_some_and(|d| d.contains("write rejected")));

    let auth = store.get(&SystemId::Zervigo, "talent_1").await.unwrap();
    assert_eq!(auth.fields["updated_at"], json!("2025-09-23T12:00:00+00:00"));
}

#[tokio::test]
async fn slow_store_surfaces_a_typed_timeout() {
    let store = InMemoryStore::new();
    seed(&store, 1, user(1, json!({})), talent(1, json!({}))).await;
    store
        .set_latency(Some(std::time::Duration::from_millis(200)))
        .await;
    let settings = SyncSettings {
        store_timeout_ms: 20,
        ..SyncSettings::default()
    };
    let ctx = context_with(&store, settings);

    let result = ctx.repair.detect_and_repair_inconsistencies("talent_1").await;
    assert_matches!(
        result,
        Err(SyncError::StoreTimeout {
            system: SystemId::Zervigo,
            operation: "fetch",
            timeout_ms: 20,
        })
    );
    assert_eq!(ctx.repair.repair_statistics().await.total_repairs, 0);
}

#[tokio::test]
async fn missing_replica_is_view_not_found() {
    let store = InMemoryStore::new();
    store.insert("talent_1", user(1, json!({}))).await;
    let ctx = context_with(&store, SyncSettings::default());

    let result = ctx.repair.detect_and_repair_inconsistencies("talent_1").await;
    assert_matches!(
        result,
        Err(SyncError::ViewNotFound { system: SystemId::LoomaCrm, .. })
    );
}

// ---------------------------------------------------------------------------
// Test: concurrency and ledger integrity
// ---------------------------------------------------------------------------

/// Passes over distinct entities share only the ledger; no update is lost.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_passes_lose_no_statistics() {
    const ENTITIES: u64 = 24;

    let store = InMemoryStore::new();
    for id in 1..=ENTITIES {
        seed(&store, id, user(id, json!({})), talent(id, json!({"name": "Stale"}))).await;
    }
    let ctx = context_with(&store, SyncSettings::default());

    let mut handles = Vec::new();
    for id in 1..=ENTITIES {
        let repair = Arc::clone(&ctx.repair);
        handles.push(tokio::spawn(async move {
            repair
                .detect_and_repair_inconsistencies(&format!("talent_{id}"))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().repair_success);
    }

    let stats = ctx.repair.repair_statistics().await;
    assert_eq!(stats.total_repairs, ENTITIES);
    assert_eq!(stats.successful_repairs, ENTITIES);
    assert_eq!(ctx.repair.recent_repairs(100).await.len(), ENTITIES as usize);
    assert!(ctx.repair.verify_ledger().await);
}

#[tokio::test]
async fn recent_repairs_are_oldest_first() {
    let store = InMemoryStore::new();
    seed(
        &store,
        1,
        user(1, json!({"status": "suspended"})),
        talent(1, json!({"name": "Old Name"})),
    )
    .await;
    seed(&store, 2, user(2, json!({})), talent(2, json!({"name": "Other"}))).await;
    let ctx = context_with(&store, SyncSettings::default());

    ctx.repair
        .detect_and_repair_inconsistencies("talent_1")
        .await
        .unwrap();
    ctx.repair
        .detect_and_repair_inconsistencies("talent_2")
        .await
        .unwrap();

    let recent = ctx.repair.recent_repairs(10).await;
    assert_eq!(recent.first().unwrap().entity_id(), "talent_1");
    assert_eq!(recent.last().unwrap().entity_id(), "talent_2");
    assert_eq!(ctx.repair.recent_repairs(1).await.len(), 1);
    assert!(ctx.repair.verify_ledger().await);
}

// ---------------------------------------------------------------------------
// Test: sweep over the bundled fixture
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_over_fixture_reports_every_entity() {
    let entries = sweep::parse_fixture(include_str!("../fixtures/views.json")).unwrap();
    let store = InMemoryStore::new();
    let ids = sweep::seed(&store, entries).await;
    let ctx = context_with(&store, SyncSettings::default());

    let outcomes = sweep::run(&ctx, &ids).await;
    assert_eq!(outcomes.len(), 4);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let by_id = |id: &str| {
        outcomes
            .iter()
            .find(|o| o.entity_id == id)
            .and_then(|o| o.result.as_ref().ok())
            .unwrap()
    };
    assert!(by_id("talent_1").issues.is_empty());
    assert!(by_id("talent_2").repair_success);
    assert_eq!(
        by_id("talent_3").records[0].action(),
        RepairAction::ManualIntervention
    );
    assert_eq!(
        by_id("talent_4").records[0].action(),
        RepairAction::PatchAuthoritative
    );

    let snapshot = ctx.snapshot().await;
    assert_eq!(snapshot.repair.successful_repairs, 2);
    assert_eq!(snapshot.repair.skipped_repairs, 1);
    assert_eq!(snapshot.cache.total_entries, 4);
}
