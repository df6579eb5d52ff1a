//! Schema evaluator: pure logic, no store access.

use std::sync::OnceLock;

use chrono::Datelike;
use regex::Regex;
use serde_json::Value;

use super::rules::{FieldViolation, ValidationResult, ValidationSeverity};
use crate::datetime::parse_timestamp;
use crate::schema::{Constraint, EntitySchema, FieldConstraint, Format, ShapeCheck};
use crate::types::Payload;

/// Conservative single-`@` address check.
const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

const PHONE_PATTERN: &str = r"^\+?1?\d{9,15}$";

/// Earliest graduation year accepted in an education record.
const MIN_GRADUATION_YEAR: i64 = 1900;

/// How far into the future a graduation year may lie.
const MAX_GRADUATION_YEARS_AHEAD: i64 = 10;

fn email_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

fn phone_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PHONE_PATTERN).ok()).as_ref()
}

/// Whether `value` passes the email format check.
pub fn is_valid_email(value: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(value))
}

/// Evaluate every declared field of `schema` against a single record.
///
/// Fields present in `data` but not declared by the schema are ignored.
pub fn evaluate_schema(schema: &EntitySchema, data: &Payload) -> ValidationResult {
    let mut result = ValidationResult::valid();

    for field in &schema.fields {
        evaluate_field(field, data.get(&field.name), &mut result);
    }

    result
}

fn evaluate_field(field: &FieldConstraint, value: Option<&Value>, result: &mut ValidationResult) {
    let value = match value {
        None | Some(Value::Null) => {
            if field.required {
                let message = format!("{} is required", field.name);
                result.push_error(
                    FieldViolation::new(&field.name, "required", message).with_value(value),
                );
            }
            return;
        }
        Some(Value::String(s)) if s.is_empty() && field.required => {
            result.push_error(
                FieldViolation::new(&field.name, "required", format!("{} is required", field.name))
                    .with_value(value),
            );
            return;
        }
        Some(v) => v,
    };

    if !field.field_type.matches(value) {
        result.push_error(
            FieldViolation::new(
                &field.name,
                "type_check",
                format!("{} must be of type {}", field.name, field.field_type.as_str()),
            )
            .with_value(Some(value)),
        );
        return;
    }

    for constraint in &field.constraints {
        if let Some((severity, violation)) = evaluate_constraint(&field.name, constraint, value) {
            result.push(severity, violation);
        }
    }
}

fn evaluate_constraint(
    field: &str,
    constraint: &Constraint,
    value: &Value,
) -> Option<(ValidationSeverity, FieldViolation)> {
    let hard = |message: String| {
        Some((
            ValidationSeverity::Error,
            FieldViolation::new(field, constraint.rule_name(), message).with_value(Some(value)),
        ))
    };

    match constraint {
        Constraint::Range { min, max, severity } => {
            let num = value.as_f64()?;
            let below = min.is_some_and(|m| num < m);
            let above = max.is_some_and(|m| num > m);
            if below || above {
                let message = format!("{field} is out of range ({})", describe_range(*min, *max));
                let violation = FieldViolation::new(field, constraint.rule_name(), message);
                Some((*severity, violation.with_value(Some(value))))
            } else {
                None
            }
        }
        Constraint::Length { min, max } => {
            let len = value.as_str()?.chars().count();
            if min.is_some_and(|m| len < m) {
                hard(format!("{field} is shorter than {} characters", min.unwrap_or(0)))
            } else if max.is_some_and(|m| len > m) {
                hard(format!("{field} is longer than {} characters", max.unwrap_or(0)))
            } else {
                None
            }
        }
        Constraint::OneOf(allowed) => {
            let s = value.as_str()?;
            if allowed.iter().any(|a| a == s) {
                None
            } else {
                hard(format!("{field} must be one of: {}", allowed.join(", ")))
            }
        }
        Constraint::Pattern(rule) => {
            let s = value.as_str()?;
            match rule.regex() {
                Some(re) if !re.is_match(s) => {
                    hard(format!("{field} does not match pattern {}", rule.source()))
                }
                _ => None,
            }
        }
        Constraint::Format(format) => {
            let s = value.as_str()?;
            if s.is_empty() || evaluate_format(*format, s) {
                None
            } else {
                hard(format!("{field} has an invalid {} format", format_name(*format)))
            }
        }
        Constraint::MaxItems { max, severity } => {
            let len = value.as_array()?.len();
            if len > *max {
                Some((
                    *severity,
                    FieldViolation::new(
                        field,
                        constraint.rule_name(),
                        format!("{field} has {len} items, more than {max}"),
                    ),
                ))
            } else {
                None
            }
        }
        Constraint::Shape(check) => {
            if evaluate_shape(*check, value) {
                None
            } else {
                hard(format!("{field} is malformed ({})", shape_name(*check)))
            }
        }
    }
}

fn evaluate_format(format: Format, value: &str) -> bool {
    match format {
        Format::Email => is_valid_email(value),
        Format::Phone => phone_regex().is_some_and(|re| re.is_match(value)),
        Format::IsoDatetime => parse_timestamp(value).is_some(),
    }
}

fn evaluate_shape(check: ShapeCheck, value: &Value) -> bool {
    match check {
        ShapeCheck::SkillList => value.as_array().is_some_and(|skills| {
            skills
                .iter()
                .all(|s| s.as_str().is_some_and(|s| !s.trim().is_empty()))
        }),
        ShapeCheck::Education => value.as_object().is_some_and(evaluate_education),
        ShapeCheck::ProjectList => value.as_array().is_some_and(|projects| {
            projects
                .iter()
                .all(|p| p.get("name").is_some_and(Value::is_string))
        }),
        ShapeCheck::RelationshipList => value.as_array().is_some_and(|relationships| {
            relationships.iter().all(|r| {
                r.as_object().is_some_and(|obj| {
                    obj.contains_key("target_talent_id") && obj.contains_key("relationship_type")
                })
            })
        }),
    }
}

/// An empty object means "no education known" and passes.
fn evaluate_education(education: &Payload) -> bool {
    if education.is_empty() {
        return true;
    }
    let has_strings = ["degree", "school"]
        .iter()
        .all(|k| education.get(*k).is_some_and(Value::is_string));
    if !has_strings {
        return false;
    }
    match education.get("graduation_year") {
        None | Some(Value::Null) => true,
        Some(year) => {
            let latest = i64::from(chrono::Utc::now().year()) + MAX_GRADUATION_YEARS_AHEAD;
            year.as_i64()
                .is_some_and(|y| (MIN_GRADUATION_YEAR..=latest).contains(&y))
        }
    }
}

fn describe_range(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(lo), Some(hi)) => format!("expected {lo}..={hi}"),
        (Some(lo), None) => format!("expected >= {lo}"),
        (None, Some(hi)) => format!("expected <= {hi}"),
        (None, None) => "unbounded".to_string(),
    }
}

fn format_name(format: Format) -> &'static str {
    match format {
        Format::Email => "email",
        Format::Phone => "phone",
        Format::IsoDatetime => "datetime",
    }
}

fn shape_name(check: ShapeCheck) -> &'static str {
    match check {
        ShapeCheck::SkillList => "expected non-empty skill strings",
        ShapeCheck::Education => "expected string degree and school",
        ShapeCheck::ProjectList => "expected objects with a name",
        ShapeCheck::RelationshipList => "expected target_talent_id and relationship_type",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::{FieldType, SchemaRegistry, LOOMA_TALENT, ZERVIGO_USER};

    fn data(pairs: &[(&str, Value)]) -> Payload {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn single(field: FieldConstraint) -> EntitySchema {
        EntitySchema::new("test", vec![field])
    }

    fn talent() -> Payload {
        data(&[
            ("id", json!("talent_1")),
            ("name", json!("Test Talent")),
            ("email", json!("test@example.com")),
            ("phone", json!("+1234567890")),
            ("skills", json!(["Python", "Sanic"])),
            ("experience", json!(5)),
            ("status", json!("active")),
            ("zervigo_user_id", json!(1)),
        ])
    }

    fn registry() -> SchemaRegistry {
        SchemaRegistry::with_builtin()
    }

    #[test]
    fn valid_talent_passes() {
        let reg = registry();
        let result = evaluate_schema(reg.get_schema(LOOMA_TALENT).unwrap(), &talent());
        assert!(result.is_valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn required_fails_missing_field() {
        let schema = single(FieldConstraint::required("test_field", FieldType::String));
        let result = evaluate_schema(&schema, &data(&[]));
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].rule_type, "required");
    }

    #[test]
    fn required_fails_null_and_empty_string() {
        let schema = single(FieldConstraint::required("test_field", FieldType::String));
        assert!(!evaluate_schema(&schema, &data(&[("test_field", Value::Null)])).is_valid);
        assert!(!evaluate_schema(&schema, &data(&[("test_field", json!(""))])).is_valid);
    }

    #[test]
    fn optional_null_is_skipped() {
        let schema = single(FieldConstraint::optional("test_field", FieldType::Integer));
        assert!(evaluate_schema(&schema, &data(&[("test_field", Value::Null)])).is_valid);
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let schema = single(FieldConstraint::required("test_field", FieldType::String));
        let result = evaluate_schema(&schema, &data(&[("test_field", json!(42))]));
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].rule_type, "type_check");
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let reg = registry();
        let mut record = talent();
        record.insert("favourite_colour".into(), json!(["not", "declared"]));
        let result = evaluate_schema(reg.get_schema(LOOMA_TALENT).unwrap(), &record);
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn bad_email_is_always_an_error() {
        let reg = registry();
        let mut record = talent();
        record.insert("email".into(), json!("invalid-email"));
        let result = evaluate_schema(reg.get_schema(LOOMA_TALENT).unwrap(), &record);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].rule_type, "email_format");
    }

    #[test]
    fn double_at_email_is_rejected() {
        assert!(!is_valid_email("a@b@example.com"));
        assert!(is_valid_email("first.last+tag@example.co"));
    }

    #[test]
    fn experience_over_fifty_is_only_a_warning() {
        let reg = registry();
        let mut record = talent();
        record.insert("experience".into(), json!(100));
        let result = evaluate_schema(reg.get_schema(LOOMA_TALENT).unwrap(), &record);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "experience");
    }

    #[test]
    fn negative_experience_is_an_error() {
        let reg = registry();
        let mut record = talent();
        record.insert("experience".into(), json!(-1));
        let result = evaluate_schema(reg.get_schema(LOOMA_TALENT).unwrap(), &record);
        assert!(!result.is_valid);
    }

    #[test]
    fn too_many_skills_is_only_a_warning() {
        let reg = registry();
        let mut record = talent();
        let skills: Vec<String> = (0..51).map(|i| format!("skill_{i}")).collect();
        record.insert("skills".into(), json!(skills));
        let result = evaluate_schema(reg.get_schema(LOOMA_TALENT).unwrap(), &record);
        assert!(result.is_valid);
        assert_eq!(result.warnings[0].rule_type, "max_items");
    }

    #[test]
    fn blank_skill_is_an_error() {
        let reg = registry();
        let mut record = talent();
        record.insert("skills".into(), json!(["Rust", "  "]));
        let result = evaluate_schema(reg.get_schema(LOOMA_TALENT).unwrap(), &record);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].rule_type, "shape");
    }

    #[test]
    fn status_outside_enum_is_an_error() {
        let reg = registry();
        let mut record = talent();
        record.insert("status".into(), json!("invalid_status"));
        let result = evaluate_schema(reg.get_schema(LOOMA_TALENT).unwrap(), &record);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].rule_type, "enum_values");
    }

    #[test]
    fn education_checks_graduation_year() {
        assert!(evaluate_shape(ShapeCheck::Education, &json!({})));
        assert!(evaluate_shape(
            ShapeCheck::Education,
            &json!({"degree": "Bachelor", "school": "Example University", "graduation_year": 2020})
        ));
        assert!(!evaluate_shape(
            ShapeCheck::Education,
            &json!({"degree": "Bachelor", "school": "Example University", "graduation_year": 1850})
        ));
        assert!(!evaluate_shape(ShapeCheck::Education, &json!({"degree": "Bachelor"})));
    }

    #[test]
    fn relationships_need_target_and_type() {
        assert!(evaluate_shape(
            ShapeCheck::RelationshipList,
            &json!([{"target_talent_id": "talent_2", "relationship_type": "colleague"}])
        ));
        assert!(!evaluate_shape(
            ShapeCheck::RelationshipList,
            &json!([{"target_talent_id": "talent_2"}])
        ));
    }

    #[test]
    fn zervigo_username_pattern_and_length() {
        let reg = registry();
        let schema = reg.get_schema(ZERVIGO_USER).unwrap();
        let user = data(&[
            ("id", json!(7)),
            ("username", json!("ab")),
            ("email", json!("ab@example.com")),
        ]);
        let result = evaluate_schema(schema, &user);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].rule_type, "length");

        let user = data(&[
            ("id", json!(7)),
            ("username", json!("bad name")),
            ("email", json!("ab@example.com")),
        ]);
        assert_eq!(
            evaluate_schema(schema, &user).errors[0].rule_type,
            "regex_pattern"
        );
    }

    #[test]
    fn invalid_timestamp_format_is_an_error() {
        let reg = registry();
        let mut record = talent();
        record.insert("updated_at".into(), json!("last tuesday"));
        let result = evaluate_schema(reg.get_schema(LOOMA_TALENT).unwrap(), &record);
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].rule_type, "datetime_format");
    }

    #[test]
    fn invalid_regex_pattern_passes() {
        let schema = single(
            FieldConstraint::required("test_field", FieldType::String)
                .with(Constraint::pattern("([")),
        );
        assert!(evaluate_schema(&schema, &data(&[("test_field", json!("x"))])).is_valid);
    }
}
