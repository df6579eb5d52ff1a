//! Shared vocabulary tables and small helpers used by the mappers.

use serde_json::Value;

use crate::datetime::normalize_timestamp;
use crate::error::CoreError;
use crate::types::Payload;

/// Prefix of Looma CRM talent ids derived from a Zervigo user id.
pub const TALENT_ID_PREFIX: &str = "talent_";

/// Prefix of Looma CRM project ids derived from a Zervigo job id.
pub const PROJECT_ID_PREFIX: &str = "project_";

/// Field renames between the two vocabularies, as `(zervigo, looma_crm)`.
pub const FIELD_ALIASES: &[(&str, &str)] = &[("username", "name")];

/// Looma CRM fields holding a Zervigo native id, as `(zervigo, looma_crm)`.
/// A mismatch means the replica is linked to a different record.
pub const LINK_FIELDS: &[(&str, &str)] = &[("id", "zervigo_user_id")];

/// Account fields both systems carry under the same name.
pub const AUTH_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "email_verified",
    "phone_verified",
    "role",
];

/// Zervigo user status → Looma CRM talent status.
///
/// Lossy: `pending` and `suspended` have no Looma counterpart.
pub fn user_status_to_looma(status: &str) -> &'static str {
    match status {
        "active" | "pending" => "active",
        _ => "inactive",
    }
}

/// Looma CRM talent status → Zervigo user status.
pub fn talent_status_to_zervigo(status: &str) -> &'static str {
    match status {
        "active" => "active",
        _ => "inactive",
    }
}

/// Zervigo job status → Looma CRM project status.
pub fn job_status_to_looma(status: &str) -> &'static str {
    match status {
        "active" => "active",
        "inactive" => "cancelled",
        "completed" => "completed",
        _ => "planning",
    }
}

/// Looma CRM project status → Zervigo job status.
pub fn project_status_to_zervigo(status: &str) -> &'static str {
    match status {
        "active" => "active",
        "cancelled" => "inactive",
        "completed" => "completed",
        _ => "pending",
    }
}

/// Fail with [`CoreError::IncompleteMappingInput`] unless every field is
/// present and non-null.
pub fn require_fields(
    mapper: &'static str,
    data: &Payload,
    fields: &[&str],
) -> Result<(), CoreError> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|f| data.get(**f).map_or(true, Value::is_null))
        .map(|f| f.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CoreError::IncompleteMappingInput { mapper, missing })
    }
}

/// String form of a native identifier (`1` and `"1"` both become `"1"`).
pub fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Recover a native identifier from a prefixed id: numeric when it parses.
pub fn strip_id_prefix(id: &str, prefix: &str) -> Value {
    let native = id.strip_prefix(prefix).unwrap_or(id);
    native
        .parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(native.to_string()))
}

pub fn str_field<'a>(data: &'a Payload, field: &str) -> Option<&'a str> {
    data.get(field).and_then(Value::as_str)
}

/// Copy a timestamp field in canonical form.
///
/// Absent or null values are left out rather than invented; values that do
/// not parse are copied verbatim so the validator can report them.
pub fn copy_timestamp(from: &Payload, from_field: &str, to: &mut Payload, to_field: &str) {
    match from.get(from_field) {
        Some(Value::String(raw)) => {
            let value = normalize_timestamp(raw).unwrap_or_else(|| raw.clone());
            to.insert(to_field.to_string(), Value::String(value));
        }
        Some(Value::Null) | None => {}
        Some(other) => {
            to.insert(to_field.to_string(), other.clone());
        }
    }
}

/// Copy the account fields that are present and non-null.
pub fn copy_auth_fields(from: &Payload, to: &mut Payload) {
    for field in AUTH_FIELDS {
        if let Some(value) = from.get(*field).filter(|v| !v.is_null()) {
            to.insert(field.to_string(), value.clone());
        }
    }
}
