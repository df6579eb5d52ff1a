//! Repair service: detect divergences between the authoritative system and a
//! replica, patch what is safe to patch, and record every decision.
//!
//! One pass runs DETECTING → DIAGNOSING → REPAIRING → RECORDED for a single
//! entity. Passes over distinct entities may run concurrently; they share
//! only the ledger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use crossmap_core::consistency::{ConsistencyChecker, ConsistencyIssue};
use crossmap_core::error::CoreError;
use crossmap_core::repair::{
    plan_repair, RepairAction, RepairEntry, RepairLedger, RepairPhase, RepairPlan, RepairRecord,
    RepairResult, RepairStats, RepairStatus, AUTO_REPAIR_DISABLED,
};
use crossmap_core::types::{EntityView, SystemId};
use crossmap_core::validation::Validator;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::SyncSettings;
use crate::error::SyncError;
use crate::mapping::MappingService;
use crate::store::{fetch_view, write_view, EntityStore};

pub struct RepairService {
    mapping: Arc<MappingService>,
    validator: Validator,
    checker: ConsistencyChecker,
    store: Arc<dyn EntityStore>,
    authoritative: SystemId,
    replica: SystemId,
    store_timeout: Duration,
    auto_repair: AtomicBool,
    ledger: Mutex<RepairLedger>,
}

/// The two sides of one pass, updated as patches land.
struct Sides {
    authoritative: EntityView,
    replica: EntityView,
}

impl RepairService {
    pub fn new(
        settings: &SyncSettings,
        mapping: Arc<MappingService>,
        validator: Validator,
        store: Arc<dyn EntityStore>,
    ) -> Self {
        Self {
            mapping,
            validator,
            checker: ConsistencyChecker::new(
                settings.severity_table(),
                settings.stale_tolerance_secs,
            ),
            store,
            authoritative: settings.authoritative_system.clone(),
            replica: settings.replica_system.clone(),
            store_timeout: settings.store_timeout(),
            auto_repair: AtomicBool::new(settings.auto_repair_enabled),
            ledger: Mutex::new(RepairLedger::new(settings.repair_log_capacity)),
        }
    }

    pub fn set_auto_repair(&self, enabled: bool) {
        self.auto_repair.store(enabled, Ordering::SeqCst);
        tracing::info!(enabled, "Auto-repair toggled");
    }

    pub fn auto_repair_enabled(&self) -> bool {
        self.auto_repair.load(Ordering::SeqCst)
    }

    /// Fetch both views of `entity_id` and run a repair pass over them.
    pub async fn detect_and_repair_inconsistencies(
        &self,
        entity_id: &str,
    ) -> Result<RepairResult, SyncError> {
        tracing::info!(entity_id, phase = %RepairPhase::Detecting, "Repair pass started");
        let store = self.store.as_ref();
        let authoritative =
            fetch_view(store, &self.authoritative, entity_id, self.store_timeout).await?;
        let replica = fetch_view(store, &self.replica, entity_id, self.store_timeout).await?;
        self.repair_views(entity_id, authoritative, replica).await
    }

    /// Run a repair pass over already-fetched views.
    pub async fn repair_views(
        &self,
        entity_id: &str,
        authoritative: EntityView,
        replica: EntityView,
    ) -> Result<RepairResult, SyncError> {
        let started_at = Utc::now();

        tracing::debug!(entity_id, phase = %RepairPhase::Diagnosing, "Diagnosing");
        let precondition = self.validator.validate_view(&authoritative)?;
        for warning in &precondition.warnings {
            tracing::debug!(entity_id, warning = %warning, "Authoritative view warning");
        }
        let issues = self.diagnose(&authoritative, &replica).await?;
        tracing::info!(
            entity_id,
            issues = issues.len(),
            authoritative_valid = precondition.is_valid,
            "Diagnosis complete",
        );

        let entries = if issues.is_empty() {
            Vec::new()
        } else if !self.auto_repair_enabled() {
            skip_all(entity_id, &issues, AUTO_REPAIR_DISABLED.to_string())
        } else if !precondition.is_valid {
            let reason = format!(
                "authoritative view failed validation: {}",
                precondition.error_messages().join("; ")
            );
            tracing::warn!(entity_id, reason = %reason, "Skipping repairs");
            skip_all(entity_id, &issues, reason)
        } else {
            tracing::debug!(entity_id, phase = %RepairPhase::Repairing, "Repairing");
            let mut sides = Sides {
                authoritative,
                replica,
            };
            let mut entries = Vec::with_capacity(issues.len());
            for issue in &issues {
                entries.push(self.repair_issue(entity_id, issue, &mut sides).await);
            }
            entries
        };

        let records = self.record(entries).await;
        let result = RepairResult::new(entity_id, started_at, issues, records);
        tracing::info!(
            entity_id,
            phase = %RepairPhase::Recorded,
            applied = result.count(RepairStatus::Applied),
            skipped = result.count(RepairStatus::Skipped),
            failed = result.count(RepairStatus::Failed),
            repair_success = result.repair_success,
            "Repair pass finished",
        );
        Ok(result)
    }

    /// The newest `n` ledger records, oldest first.
    pub async fn recent_repairs(&self, n: usize) -> Vec<RepairRecord> {
        self.ledger.lock().await.recent(n)
    }

    pub async fn repair_statistics(&self) -> RepairStats {
        self.ledger.lock().await.stats()
    }

    /// Re-check the ledger's integrity-hash chain.
    pub async fn verify_ledger(&self) -> bool {
        match self.ledger.lock().await.verify() {
            Ok(()) => true,
            Err(broken) => {
                tracing::error!(
                    record_id = %broken.record_id,
                    position = broken.position,
                    "Repair ledger hash chain broken",
                );
                false
            }
        }
    }

    // -- phases ------------------------------------------------------------

    /// Map the authoritative view into the replica's shape and compare.
    async fn diagnose(
        &self,
        authoritative: &EntityView,
        replica: &EntityView,
    ) -> Result<Vec<ConsistencyIssue>, SyncError> {
        let mapped = self
            .mapping
            .map_data(&authoritative.system, &replica.system, &authoritative.fields)
            .await?;
        let mapped = EntityView::new(replica.system.clone(), replica.entity_type.clone(), mapped);
        let checker = self.checker.clone().with_schema_fields(
            self.validator.schemas(),
            &authoritative.entity_type,
            &replica.entity_type,
        )?;
        Ok(checker.check(&mapped, replica).issues)
    }

    async fn repair_issue(
        &self,
        entity_id: &str,
        issue: &ConsistencyIssue,
        sides: &mut Sides,
    ) -> RepairEntry {
        let entry = |action, status, detail: String| RepairEntry {
            entity_id: entity_id.to_string(),
            issue: issue.clone(),
            action,
            status,
            detail: Some(detail),
        };

        let (action, field, value) = match plan_repair(issue) {
            RepairPlan::Skip { action, reason } => {
                tracing::info!(entity_id, field = %issue.field, reason = %reason, "Issue skipped");
                return entry(action, RepairStatus::Skipped, reason);
            }
            RepairPlan::Patch {
                action,
                field,
                value,
            } => (action, field, value),
        };

        match self.apply_patch(entity_id, action, &field, value, sides).await {
            Ok(detail) => {
                tracing::info!(entity_id, field = %field, action = %action, "Repair applied");
                entry(action, RepairStatus::Applied, detail)
            }
            Err(e) => {
                tracing::warn!(
                    entity_id,
                    field = %field,
                    action = %action,
                    error = %e,
                    "Repair failed",
                );
                entry(action, RepairStatus::Failed, e.to_string())
            }
        }
    }

    /// Patch one side, validate it, and write it through the store.
    async fn apply_patch(
        &self,
        entity_id: &str,
        action: RepairAction,
        field: &str,
        value: Value,
        sides: &mut Sides,
    ) -> Result<String, SyncError> {
        let (target, value) = match action {
            RepairAction::PatchAuthoritative => {
                let value = self.authoritative_value(field, value, sides).await?;
                (&mut sides.authoritative, value)
            }
            _ => (&mut sides.replica, value),
        };

        let mut patched = target.fields.clone();
        let previous = patched.insert(field.to_string(), value.clone());
        let validation = self.validator.validate(&target.entity_type, &patched)?;
        if !validation.is_valid {
            return Err(apply_failure(field, validation.error_messages().join("; ")));
        }

        write_view(
            self.store.as_ref(),
            &target.system,
            entity_id,
            patched.clone(),
            self.store_timeout,
        )
        .await
        .map_err(|e| apply_failure(field, e.to_string()))?;

        target.fields = patched;
        Ok(format!(
            "{field} on {}: {} -> {}",
            target.system,
            previous.unwrap_or(Value::Null),
            value
        ))
    }

    /// Translate a replica-side value into the authoritative system's shape
    /// by reverse-mapping the replica with the value applied.
    async fn authoritative_value(
        &self,
        field: &str,
        value: Value,
        sides: &Sides,
    ) -> Result<Value, SyncError> {
        let mut replica = sides.replica.fields.clone();
        replica.insert(field.to_string(), value.clone());
        let reversed = self
            .mapping
            .reverse_map_data(&sides.authoritative.system, &sides.replica.system, &replica)
            .await
            .map_err(|e| apply_failure(field, e.to_string()))?;
        Ok(reversed.get(field).cloned().unwrap_or(value))
    }

    async fn record(&self, entries: Vec<RepairEntry>) -> Vec<RepairRecord> {
        let now = Utc::now();
        let mut ledger = self.ledger.lock().await;
        entries
            .into_iter()
            .map(|entry| ledger.append(entry, now).clone())
            .collect()
    }
}

fn skip_all(entity_id: &str, issues: &[ConsistencyIssue], reason: String) -> Vec<RepairEntry> {
    issues
        .iter()
        .map(|issue| RepairEntry {
            entity_id: entity_id.to_string(),
            issue: issue.clone(),
            action: RepairAction::NoAction,
            status: RepairStatus::Skipped,
            detail: Some(reason.clone()),
        })
        .collect()
}

fn apply_failure(field: &str, reason: String) -> SyncError {
    SyncError::Core(CoreError::RepairApplyFailure {
        field: field.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use crossmap_core::consistency::IssueKind;
    use crossmap_core::types::Payload;
    use serde_json::json;

    use super::*;
    use crate::store::InMemoryStore;

    fn payload(value: Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    fn user(pairs: Value) -> EntityView {
        let mut fields = payload(json!({
            "id": 1,
            "username": "test_user",
            "email": "test@example.com",
            "role": "user",
            "status": "active",
            "created_at": "2025-09-23T10:00:00Z",
            "updated_at": "2025-09-23T10:00:00Z"
        }));
        fields.extend(payload(pairs));
        EntityView::new(SystemId::Zervigo, "zervigo_user", fields)
    }

    fn talent(pairs: Value) -> EntityView {
        let mut fields = payload(json!({
            "id": "talent_1",
            "name": "test_user",
            "email": "test@example.com",
            "skills": ["Python"],
            "status": "active",
            "zervigo_user_id": 1,
            "created_at": "2025-09-23T10:00:00Z",
            "updated_at": "2025-09-23T10:00:00Z"
        }));
        fields.extend(payload(pairs));
        EntityView::new(SystemId::LoomaCrm, "looma_talent", fields)
    }

    async fn service_with(store: &InMemoryStore) -> RepairService {
        RepairService::new(
            &SyncSettings::default(),
            Arc::new(MappingService::default()),
            Validator::default(),
            Arc::new(store.clone()),
        )
    }

    async fn seeded(auth: EntityView, replica: EntityView) -> (InMemoryStore, RepairService) {
        let store = InMemoryStore::new();
        store.insert("talent_1", auth).await;
        store.insert("talent_1", replica).await;
        let service = service_with(&store).await;
        (store, service)
    }

    #[tokio::test]
    async fn consistent_views_need_no_repair() {
        let (_, service) = seeded(user(json!({})), talent(json!({}))).await;
        let result = service.detect_and_repair_inconsistencies("talent_1").await.unwrap();
        assert!(result.issues.is_empty());
        assert!(result.records.is_empty());
        assert!(result.repair_success);
    }

    #[tokio::test]
    async fn replica_only_fields_are_not_compared() {
        let (_, service) =
            seeded(user(json!({})), talent(json!({"skills": ["Rust", "Go"]}))).await;
        let result = service.detect_and_repair_inconsistencies("talent_1").await.unwrap();
        assert!(result.issues.is_empty());
    }

    #[tokio::test]
    async fn newer_replica_timestamp_is_written_back() {
        let (store, service) = seeded(
            user(json!({})),
            talent(json!({"updated_at": "2025-09-23T12:00:00Z"})),
        )
        .await;
        let result = service.detect_and_repair_inconsistencies("talent_1").await.unwrap();
        assert_eq!(result.issues[0].kind, IssueKind::StaleTimestamp);
        assert_eq!(result.records[0].action(), RepairAction::PatchAuthoritative);
        assert_eq!(result.records[0].status(), RepairStatus::Applied);
        let auth = store.get(&SystemId::Zervigo, "talent_1").await.unwrap();
        assert_eq!(auth.fields["updated_at"], json!("2025-09-23T12:00:00+00:00"));
    }

    #[tokio::test]
    async fn high_severity_issue_is_left_for_manual_intervention() {
        let (store, service) =
            seeded(user(json!({})), talent(json!({"status": "inactive"}))).await;
        let result = service.detect_and_repair_inconsistencies("talent_1").await.unwrap();
        assert!(!result.repair_success);
        assert_eq!(result.records[0].action(), RepairAction::ManualIntervention);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn replica_linked_to_another_user_needs_manual_intervention() {
        let (store, service) =
            seeded(user(json!({})), talent(json!({"zervigo_user_id": 999}))).await;
        let result = service.detect_and_repair_inconsistencies("talent_1").await.unwrap();
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].field, "zervigo_user_id");
        assert!(!result.repair_success);
        assert_eq!(result.records[0].action(), RepairAction::ManualIntervention);
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn invalid_authoritative_view_skips_everything() {
        let (store, service) = seeded(
            user(json!({"username": "x"})),
            talent(json!({"name": "Old Name"})),
        )
        .await;
        let result = service.detect_and_repair_inconsistencies("talent_1").await.unwrap();
        assert_eq!(result.count(RepairStatus::Skipped), result.issues.len());
        assert!(result.records[0]
            .detail()
            .is_some_and(|d| d.starts_with("authoritative view failed validation")));
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn toggle_is_observable() {
        let store = InMemoryStore::new();
        let service = service_with(&store).await;
        assert!(service.auto_repair_enabled());
        service.set_auto_repair(false);
        assert!(!service.auto_repair_enabled());
    }
}
