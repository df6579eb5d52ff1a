//! Cross-field business rules applied after the structural pass.

use serde_json::Value;

use super::rules::{FieldViolation, ValidationResult};
use crate::datetime::parse_timestamp;
use crate::types::{Payload, Timestamp};

/// Evaluate the cross-field rules against one record.
///
/// Rules only look at fields that are present; a record without `status`
/// or timestamps passes trivially.
pub fn evaluate_business_rules(data: &Payload) -> ValidationResult {
    let mut result = ValidationResult::valid();

    if is_active(data) && !has_email(data) {
        result.push_error(FieldViolation::new(
            "email",
            "active_requires_email",
            "active records must provide an email address",
        ));
    }

    let created = timestamp(data, "created_at");
    let updated = timestamp(data, "updated_at");
    if let (Some(created), Some(updated)) = (created, updated) {
        if updated < created {
            result.push_warning(
                FieldViolation::new(
                    "updated_at",
                    "updated_before_created",
                    "updated_at is earlier than created_at",
                )
                .with_value(data.get("updated_at")),
            );
        }
    }

    result
}

fn is_active(data: &Payload) -> bool {
    data.get("status").and_then(Value::as_str) == Some("active")
}

fn has_email(data: &Payload) -> bool {
    data.get("email")
        .and_then(Value::as_str)
        .is_some_and(|e| !e.trim().is_empty())
}

fn timestamp(data: &Payload, field: &str) -> Option<Timestamp> {
    data.get(field).and_then(Value::as_str).and_then(parse_timestamp)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn data(pairs: &[(&str, Value)]) -> Payload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn active_without_email_is_an_error() {
        let result =
            evaluate_business_rules(&data(&[("status", json!("active")), ("email", json!(""))]));
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].rule_type, "active_requires_email");
    }

    #[test]
    fn inactive_without_email_passes() {
        let result = evaluate_business_rules(&data(&[("status", json!("inactive"))]));
        assert!(result.is_valid);
    }

    #[test]
    fn updated_before_created_is_a_warning() {
        let result = evaluate_business_rules(&data(&[
            ("created_at", json!("2025-09-23T10:00:00Z")),
            ("updated_at", json!("2025-09-22T10:00:00Z")),
        ]));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }
}
