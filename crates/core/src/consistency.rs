//! Field-level comparison of two views of the same logical entity.
//!
//! The checker never decides which side is right; it reports divergences
//! with a severity and both values. The repair decision lives in
//! [`crate::repair`].

use std::collections::BTreeSet;
use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::datetime::parse_timestamp;
use crate::error::CoreError;
use crate::mapping::vocab::{FIELD_ALIASES, LINK_FIELDS};
use crate::schema::SchemaRegistry;
use crate::types::{EntityView, Payload, SystemId};
use crate::validation::{FieldViolation, ValidationResult};

/// Fields compared for every entity pair, ahead of the configured ones.
pub const IDENTITY_FIELDS: &[&str] = &["email", "status", "updated_at"];

/// Default high-severity fields.
pub const DEFAULT_HIGH_SEVERITY_FIELDS: &[&str] = &["status", "email", "zervigo_user_id"];

/// `updated_at` values further apart than this are reported as stale.
pub const DEFAULT_STALE_TOLERANCE_SECS: u64 = 300;

/// The field the staleness rule applies to.
const FRESHNESS_FIELD: &str = "updated_at";

// ---------------------------------------------------------------------------
// Issue types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FieldMismatch,
    MissingField,
    StaleTimestamp,
}

impl IssueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueKind::FieldMismatch => "field_mismatch",
            IssueKind::MissingField => "missing_field",
            IssueKind::StaleTimestamp => "stale_timestamp",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One divergence between the left and right view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyIssue {
    pub kind: IssueKind,
    pub field: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_value: Option<Value>,
}

impl ConsistencyIssue {
    pub fn is_high(&self) -> bool {
        self.severity == Severity::High
    }

    fn violation(&self) -> FieldViolation {
        FieldViolation::new(&self.field, self.kind.as_str(), self.description.clone())
            .with_value(self.right_value.as_ref().or(self.left_value.as_ref()))
    }
}

impl fmt::Display for ConsistencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}: {}", self.severity, self.kind, self.field, self.description)
    }
}

// ---------------------------------------------------------------------------
// Severity table
// ---------------------------------------------------------------------------

/// Severity assigned to a `field_mismatch` by field name. Fields in neither
/// set are low severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeverityTable {
    high: BTreeSet<String>,
    medium: BTreeSet<String>,
}

impl SeverityTable {
    /// A field listed in both sets is high severity.
    pub fn new<H, M>(high: H, medium: M) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            high: high.into_iter().map(Into::into).collect(),
            medium: medium.into_iter().map(Into::into).collect(),
        }
    }

    pub fn severity_of(&self, field: &str) -> Severity {
        if self.high.contains(field) {
            Severity::High
        } else if self.medium.contains(field) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

impl Default for SeverityTable {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_SEVERITY_FIELDS.iter().copied(), Vec::<String>::new())
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub left_system: SystemId,
    pub right_system: SystemId,
    /// False exactly when a high-severity issue is present.
    pub is_valid: bool,
    pub issues: Vec<ConsistencyIssue>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn high_severity_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_high()).count()
    }

    /// High-severity issues become errors, everything else warnings.
    pub fn to_validation_result(&self) -> ValidationResult {
        let mut result = ValidationResult::valid();
        for issue in &self.issues {
            if issue.is_high() {
                result.push_error(issue.violation());
            } else {
                result.push_warning(issue.violation());
            }
        }
        result
    }
}

// ---------------------------------------------------------------------------
// Checker
// ---------------------------------------------------------------------------

/// Compares the identity fields plus a configured set of common fields.
///
/// `id` is never compared: callers pair views by id before checking them.
#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
    severity: SeverityTable,
    tolerance: Duration,
    common_fields: Vec<String>,
}

impl ConsistencyChecker {
    pub fn new(severity: SeverityTable, tolerance_secs: u64) -> Self {
        Self {
            severity,
            tolerance: Duration::seconds(tolerance_secs.min(u32::MAX as u64) as i64),
            common_fields: Vec::new(),
        }
    }

    /// Also compare `fields`, after the identity fields.
    pub fn with_common_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.common_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Also compare every field both schemas declare, plus alias pairs the
    /// two schemas declare under different names (named as in `right_type`).
    ///
    /// When `right_type` carries a link to a native id `left_type` declares
    /// (`zervigo_user_id` against a user's `id`), the link field is compared
    /// too. The reverse direction would compare `id`, which is never
    /// compared.
    pub fn with_schema_fields(
        self,
        schemas: &SchemaRegistry,
        left_type: &str,
        right_type: &str,
    ) -> Result<Self, CoreError> {
        let mut fields = schemas.common_fields(left_type, right_type)?;
        let left = schemas.get_schema(left_type)?;
        let right = schemas.get_schema(right_type)?;
        for &(a, b) in FIELD_ALIASES {
            for (l, r) in [(a, b), (b, a)] {
                if left.declares(l) && right.declares(r) && !fields.iter().any(|f| f == r) {
                    fields.push(r.to_string());
                }
            }
        }
        for &(native, link) in LINK_FIELDS {
            if left.declares(native) && right.declares(link) && !fields.iter().any(|f| f == link) {
                fields.push(link.to_string());
            }
        }
        Ok(self.with_common_fields(fields))
    }

    pub fn severity_table(&self) -> &SeverityTable {
        &self.severity
    }

    /// Identity fields first, then configured fields, without duplicates.
    pub fn compared_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = IDENTITY_FIELDS.to_vec();
        for field in &self.common_fields {
            let field = field.as_str();
            if field != "id" && !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }

    pub fn check(&self, left: &EntityView, right: &EntityView) -> ConsistencyReport {
        let issues: Vec<ConsistencyIssue> = self
            .compared_fields()
            .into_iter()
            .filter_map(|field| self.compare_field(field, &left.fields, &right.fields))
            .collect();
        ConsistencyReport {
            left_system: left.system.clone(),
            right_system: right.system.clone(),
            is_valid: !issues.iter().any(ConsistencyIssue::is_high),
            issues,
        }
    }

    /// [`ConsistencyChecker::check`] folded into a [`ValidationResult`].
    pub fn validate_cross_service_consistency(
        &self,
        left: &EntityView,
        right: &EntityView,
    ) -> ValidationResult {
        self.check(left, right).to_validation_result()
    }

    fn compare_field(
        &self,
        field: &str,
        left: &Payload,
        right: &Payload,
    ) -> Option<ConsistencyIssue> {
        let l = present(left, field);
        let r = present(right, field);
        match (l, r) {
            (None, None) => None,
            (Some(_), None) | (None, Some(_)) => Some(ConsistencyIssue {
                kind: IssueKind::MissingField,
                field: field.to_string(),
                description: format!(
                    "{field} present only in the {} view",
                    if l.is_some() { "left" } else { "right" }
                ),
                severity: Severity::Medium,
                left_value: l.cloned(),
                right_value: r.cloned(),
            }),
            (Some(lv), Some(rv)) if is_timestamp_field(field) => {
                self.compare_instants(field, lv, rv)
            }
            (Some(lv), Some(rv)) if lv != rv => Some(self.mismatch(field, lv, rv)),
            _ => None,
        }
    }

    fn compare_instants(&self, field: &str, lv: &Value, rv: &Value) -> Option<ConsistencyIssue> {
        if lv == rv {
            return None;
        }
        let parsed = (
            lv.as_str().and_then(parse_timestamp),
            rv.as_str().and_then(parse_timestamp),
        );
        let (lt, rt) = match parsed {
            (Some(lt), Some(rt)) => (lt, rt),
            (lt, _) => {
                let bad = if lt.is_none() { lv } else { rv };
                return Some(ConsistencyIssue {
                    kind: IssueKind::StaleTimestamp,
                    field: field.to_string(),
                    description: format!("{field} is not a valid timestamp: {bad}"),
                    severity: Severity::Low,
                    left_value: Some(lv.clone()),
                    right_value: Some(rv.clone()),
                });
            }
        };

        if field == FRESHNESS_FIELD {
            let drift = (lt - rt).abs();
            return (drift > self.tolerance).then(|| ConsistencyIssue {
                kind: IssueKind::StaleTimestamp,
                field: field.to_string(),
                description: format!(
                    "{field} differs by {}s (tolerance {}s)",
                    drift.num_seconds(),
                    self.tolerance.num_seconds()
                ),
                severity: Severity::Low,
                left_value: Some(lv.clone()),
                right_value: Some(rv.clone()),
            });
        }

        (lt != rt).then(|| self.mismatch(field, lv, rv))
    }

    fn mismatch(&self, field: &str, lv: &Value, rv: &Value) -> ConsistencyIssue {
        ConsistencyIssue {
            kind: IssueKind::FieldMismatch,
            field: field.to_string(),
            description: format!("{field} differs: {lv} != {rv}"),
            severity: self.severity.severity_of(field),
            left_value: Some(lv.clone()),
            right_value: Some(rv.clone()),
        }
    }
}

impl Default for ConsistencyChecker {
    fn default() -> Self {
        Self::new(SeverityTable::default(), DEFAULT_STALE_TOLERANCE_SECS)
    }
}

fn present<'a>(data: &'a Payload, field: &str) -> Option<&'a Value> {
    data.get(field).filter(|v| !v.is_null())
}

fn is_timestamp_field(field: &str) -> bool {
    field.ends_with("_at")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn view(system: SystemId, pairs: &[(&str, Value)]) -> EntityView {
        let fields = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        EntityView::new(system, "looma_talent", fields)
    }

    fn talent(pairs: &[(&str, Value)]) -> EntityView {
        let mut base = view(
            SystemId::LoomaCrm,
            &[
                ("id", json!("talent_1")),
                ("name", json!("Test Talent")),
                ("email", json!("test@example.com")),
                ("status", json!("active")),
                ("created_at", json!("2025-09-23T10:00:00Z")),
                ("updated_at", json!("2025-09-23T10:00:00Z")),
            ],
        );
        for (k, v) in pairs {
            base.fields.insert(k.to_string(), v.clone());
        }
        base
    }

    fn checker() -> ConsistencyChecker {
        ConsistencyChecker::default().with_common_fields(["id", "name", "created_at"])
    }

    #[test]
    fn identical_views_are_consistent() {
        let report = checker().check(&talent(&[]), &talent(&[]));
        assert!(report.is_valid);
        assert!(report.is_consistent());
    }

    #[test]
    fn status_difference_is_one_high_mismatch() {
        let report = checker().check(&talent(&[]), &talent(&[("status", json!("inactive"))]));
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.kind, IssueKind::FieldMismatch);
        assert_eq!(issue.severity, Severity::High);
        assert_eq!(issue.right_value, Some(json!("inactive")));
    }

    #[test]
    fn unlisted_field_mismatch_is_low() {
        let report = checker().check(&talent(&[]), &talent(&[("name", json!("Other"))]));
        assert!(report.is_valid);
        assert_eq!(report.issues[0].severity, Severity::Low);
    }

    #[test]
    fn configured_medium_field() {
        let table = SeverityTable::new(["status"], ["name", "status"]);
        assert_eq!(table.severity_of("status"), Severity::High);
        assert_eq!(table.severity_of("name"), Severity::Medium);
        assert_eq!(table.severity_of("email"), Severity::Low);
    }

    #[test]
    fn one_sided_field_is_missing_medium() {
        let mut right = talent(&[]);
        right.fields.insert("name".into(), Value::Null);
        let report = checker().check(&talent(&[]), &right);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::MissingField);
        assert_eq!(report.issues[0].severity, Severity::Medium);
        assert!(report.is_valid);
    }

    #[test]
    fn timestamps_compare_as_instants() {
        let report = checker().check(
            &talent(&[("created_at", json!("2025-09-23T10:00:00Z"))]),
            &talent(&[("created_at", json!("2025-09-23T12:00:00+02:00"))]),
        );
        assert!(report.is_consistent(), "{:?}", report.issues);
    }

    #[test]
    fn updated_at_within_tolerance_is_not_an_issue() {
        let report = checker().check(
            &talent(&[]),
            &talent(&[("updated_at", json!("2025-09-23T10:04:59Z"))]),
        );
        assert!(report.is_consistent());
    }

    #[test]
    fn updated_at_beyond_tolerance_is_stale() {
        let report = checker().check(
            &talent(&[]),
            &talent(&[("updated_at", json!("2025-09-23T11:00:00Z"))]),
        );
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::StaleTimestamp);
        assert_eq!(report.issues[0].severity, Severity::Low);
        assert!(report.is_valid);
    }

    #[test]
    fn unparseable_timestamp_is_low_stale() {
        let report = checker().check(
            &talent(&[]),
            &talent(&[("updated_at", json!("yesterday"))]),
        );
        assert_eq!(report.issues[0].kind, IssueKind::StaleTimestamp);
        assert!(report.issues[0].description.contains("yesterday"));
    }

    #[test]
    fn id_is_never_compared() {
        let report = checker().check(&talent(&[]), &talent(&[("id", json!("talent_2"))]));
        assert!(report.is_consistent());
    }

    #[test]
    fn issue_order_follows_field_order() {
        let report = checker().check(
            &talent(&[]),
            &talent(&[("name", json!("Other")), ("email", json!("x@example.com"))]),
        );
        let fields: Vec<&str> = report.issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["email", "name"]);
    }

    #[test]
    fn cross_service_result_splits_by_severity() {
        let result = checker().validate_cross_service_consistency(
            &talent(&[]),
            &talent(&[("status", json!("inactive")), ("name", json!("Other"))]),
        );
        assert!(!result.is_valid);
        assert_eq!(result.error_count(), 1);
        assert_eq!(result.warning_count(), 1);
        assert_eq!(result.errors[0].rule_type, "field_mismatch");
    }

    #[test]
    fn schema_fields_extend_comparison() {
        let schemas = SchemaRegistry::with_builtin();
        let checker = ConsistencyChecker::default()
            .with_schema_fields(&schemas, "looma_talent", "zervigo_user")
            .unwrap();
        assert_eq!(
            checker.compared_fields(),
            vec!["email", "status", "updated_at", "created_at", "username"]
        );
    }

    #[test]
    fn user_link_is_compared_toward_the_talent() {
        let schemas = SchemaRegistry::with_builtin();
        let checker = ConsistencyChecker::default()
            .with_schema_fields(&schemas, "zervigo_user", "looma_talent")
            .unwrap();
        assert!(checker.compared_fields().contains(&"zervigo_user_id"));
        assert!(checker.compared_fields().contains(&"name"));
    }

    #[test]
    fn wrong_user_link_is_a_high_mismatch() {
        let schemas = SchemaRegistry::with_builtin();
        let checker = ConsistencyChecker::default()
            .with_schema_fields(&schemas, "zervigo_user", "looma_talent")
            .unwrap();
        let left = talent(&[("zervigo_user_id", json!(1))]);
        let right = talent(&[("zervigo_user_id", json!(999))]);
        let report = checker.check(&left, &right);
        assert!(!report.is_valid);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].field, "zervigo_user_id");
        assert_eq!(report.issues[0].kind, IssueKind::FieldMismatch);
        assert_eq!(report.issues[0].severity, Severity::High);
    }
}
