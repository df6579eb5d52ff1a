//! Repair decisions, the hash-chained repair ledger, and repair statistics.
//!
//! The async orchestration (fetching views, writing patches) lives in
//! `crossmap-sync`; everything here is deterministic given its inputs.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::audit::{compute_integrity_hash, redact_field_value};
use crate::consistency::{ConsistencyIssue, IssueKind};
use crate::datetime::parse_timestamp;
use crate::types::Timestamp;

/// Default number of records kept in a ledger.
pub const DEFAULT_LEDGER_CAPACITY: usize = 1000;

/// Detail recorded for every issue when auto-repair is off.
pub const AUTO_REPAIR_DISABLED: &str = "auto-repair disabled";

// ---------------------------------------------------------------------------
// Status, action, phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairStatus {
    Applied,
    Skipped,
    Failed,
}

impl RepairStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairStatus::Applied => "applied",
            RepairStatus::Skipped => "skipped",
            RepairStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RepairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side a repair writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    PatchReplica,
    PatchAuthoritative,
    /// Left for a human; nothing is written.
    ManualIntervention,
    /// Nothing attempted (auto-repair off or precondition failed).
    NoAction,
}

impl RepairAction {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairAction::PatchReplica => "patch_replica",
            RepairAction::PatchAuthoritative => "patch_authoritative",
            RepairAction::ManualIntervention => "manual_intervention",
            RepairAction::NoAction => "no_action",
        }
    }
}

impl fmt::Display for RepairAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phases of one repair pass, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairPhase {
    Detecting,
    Diagnosing,
    Repairing,
    Recorded,
}

impl RepairPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairPhase::Detecting => "detecting",
            RepairPhase::Diagnosing => "diagnosing",
            RepairPhase::Repairing => "repairing",
            RepairPhase::Recorded => "recorded",
        }
    }
}

impl fmt::Display for RepairPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// What to do about one issue found between the authoritative view (left)
/// and the replica (right).
#[derive(Debug, Clone, PartialEq)]
pub enum RepairPlan {
    /// Set `field` to `value` on the side named by `action`.
    Patch {
        action: RepairAction,
        field: String,
        value: Value,
    },
    Skip {
        action: RepairAction,
        reason: String,
    },
}

/// Decide how to resolve an issue.
///
/// - High severity → manual intervention.
/// - `field_mismatch` and `missing_field` with an authoritative value → patch
///   the replica with that value.
/// - `stale_timestamp` → the newer timestamp wins, on whichever side is older.
pub fn plan_repair(issue: &ConsistencyIssue) -> RepairPlan {
    if issue.is_high() {
        return RepairPlan::Skip {
            action: RepairAction::ManualIntervention,
            reason: format!(
                "{} severity {} requires manual intervention",
                issue.severity, issue.kind
            ),
        };
    }
    match issue.kind {
        IssueKind::FieldMismatch | IssueKind::MissingField => match &issue.left_value {
            Some(value) => RepairPlan::Patch {
                action: RepairAction::PatchReplica,
                field: issue.field.clone(),
                value: value.clone(),
            },
            None => RepairPlan::Skip {
                action: RepairAction::ManualIntervention,
                reason: format!("{} present only on the replica", issue.field),
            },
        },
        IssueKind::StaleTimestamp => plan_newest_wins(issue),
    }
}

fn plan_newest_wins(issue: &ConsistencyIssue) -> RepairPlan {
    let instant =
        |v: &Option<Value>| v.as_ref().and_then(Value::as_str).and_then(parse_timestamp);
    match (instant(&issue.left_value), instant(&issue.right_value)) {
        (Some(left), Some(right)) => {
            let (action, value) = if left >= right {
                (RepairAction::PatchReplica, issue.left_value.clone())
            } else {
                (RepairAction::PatchAuthoritative, issue.right_value.clone())
            };
            RepairPlan::Patch {
                action,
                field: issue.field.clone(),
                value: value.unwrap_or(Value::Null),
            }
        }
        _ => RepairPlan::Skip {
            action: RepairAction::ManualIntervention,
            reason: format!("{} cannot be ordered: unparseable timestamp", issue.field),
        },
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One immutable ledger entry. Built only by [`RepairLedger::append`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairRecord {
    id: Uuid,
    entity_id: String,
    issue: ConsistencyIssue,
    action: RepairAction,
    status: RepairStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    recorded_at: Timestamp,
    integrity_hash: String,
}

impl RepairRecord {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn issue(&self) -> &ConsistencyIssue {
        &self.issue
    }

    pub fn action(&self) -> RepairAction {
        self.action
    }

    pub fn status(&self) -> RepairStatus {
        self.status
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn recorded_at(&self) -> Timestamp {
        self.recorded_at
    }

    pub fn integrity_hash(&self) -> &str {
        &self.integrity_hash
    }

    /// Canonical serialized content covered by the integrity hash.
    fn canonical_content(&self) -> String {
        serde_json::json!({
            "id": self.id,
            "entity_id": self.entity_id,
            "issue": self.issue,
            "action": self.action,
            "status": self.status,
            "detail": self.detail,
            "recorded_at": self.recorded_at,
        })
        .to_string()
    }
}

/// What the caller knows about a repair before it is recorded.
#[derive(Debug, Clone)]
pub struct RepairEntry {
    pub entity_id: String,
    pub issue: ConsistencyIssue,
    pub action: RepairAction,
    pub status: RepairStatus,
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Lifetime counters. `total_repairs` counts attempted repairs only
/// (applied + failed); skipped issues are counted separately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairStats {
    pub total_repairs: u64,
    pub successful_repairs: u64,
    pub failed_repairs: u64,
    pub skipped_repairs: u64,
    /// `successful / total`, in `0.0..=1.0`; `0.0` when nothing was attempted.
    pub success_rate: f64,
}

impl RepairStats {
    fn count(&mut self, status: RepairStatus) {
        match status {
            RepairStatus::Applied => self.successful_repairs += 1,
            RepairStatus::Failed => self.failed_repairs += 1,
            RepairStatus::Skipped => self.skipped_repairs += 1,
        }
        self.total_repairs = self.successful_repairs + self.failed_repairs;
        self.success_rate = if self.total_repairs == 0 {
            0.0
        } else {
            self.successful_repairs as f64 / self.total_repairs as f64
        };
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Where the hash chain breaks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    pub record_id: Uuid,
    pub position: usize,
}

/// Bounded, append-only, hash-chained history of repair records.
///
/// When full, the oldest record is dropped and its hash becomes the anchor
/// the remaining chain is verified from. Statistics cover every record ever
/// appended, not just the retained ones.
#[derive(Debug, Clone)]
pub struct RepairLedger {
    records: VecDeque<RepairRecord>,
    capacity: usize,
    anchor_hash: Option<String>,
    stats: RepairStats,
}

impl RepairLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
            anchor_hash: None,
            stats: RepairStats::default(),
        }
    }

    /// Record a repair outcome. Issue values on sensitive fields are
    /// redacted before hashing.
    pub fn append(&mut self, entry: RepairEntry, now: Timestamp) -> &RepairRecord {
        let mut issue = entry.issue;
        issue.left_value = issue.left_value.map(|v| redact_field_value(&issue.field, &v));
        issue.right_value = issue.right_value.map(|v| redact_field_value(&issue.field, &v));

        let mut record = RepairRecord {
            id: Uuid::now_v7(),
            entity_id: entry.entity_id,
            issue,
            action: entry.action,
            status: entry.status,
            detail: entry.detail,
            recorded_at: now,
            integrity_hash: String::new(),
        };
        record.integrity_hash =
            compute_integrity_hash(self.last_hash(), &record.canonical_content());

        if self.records.len() >= self.capacity {
            if let Some(dropped) = self.records.pop_front() {
                self.anchor_hash = Some(dropped.integrity_hash);
            }
        }
        self.stats.count(record.status);
        self.records.push_back(record);
        &self.records[self.records.len() - 1]
    }

    pub fn stats(&self) -> RepairStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The newest `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<RepairRecord> {
        let skip = self.records.len().saturating_sub(n);
        self.records.iter().skip(skip).cloned().collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &RepairRecord> {
        self.records.iter()
    }

    /// Re-derive every retained record's hash from its predecessor.
    pub fn verify(&self) -> Result<(), ChainBreak> {
        let mut prev = self.anchor_hash.as_deref();
        for (position, record) in self.records.iter().enumerate() {
            let expected = compute_integrity_hash(prev, &record.canonical_content());
            if expected != record.integrity_hash {
                return Err(ChainBreak {
                    record_id: record.id,
                    position,
                });
            }
            prev = Some(&record.integrity_hash);
        }
        Ok(())
    }

    fn last_hash(&self) -> Option<&str> {
        self.records
            .back()
            .map(|r| r.integrity_hash.as_str())
            .or(self.anchor_hash.as_deref())
    }
}

impl Default for RepairLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Result of one pass
// ---------------------------------------------------------------------------

/// Outcome of one repair pass over a single entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairResult {
    pub entity_id: String,
    pub started_at: Timestamp,
    pub issues: Vec<ConsistencyIssue>,
    pub records: Vec<RepairRecord>,
    /// True when no issue is left unresolved (vacuously true with no issues).
    pub repair_success: bool,
}

impl RepairResult {
    pub fn new(
        entity_id: &str,
        started_at: Timestamp,
        issues: Vec<ConsistencyIssue>,
        records: Vec<RepairRecord>,
    ) -> Self {
        let repair_success = records.len() == issues.len()
            && records.iter().all(|r| r.status == RepairStatus::Applied);
        Self {
            entity_id: entity_id.to_string(),
            started_at,
            issues,
            records,
            repair_success,
        }
    }

    pub fn count(&self, status: RepairStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
