//! Looma CRM → Zervigo mapper.
//!
//! Dispatches on the id prefix: `talent_*` records become users, `project_*`
//! records become jobs, anything else goes through the default field table.
//! A `{"talent": …}` envelope is unwrapped first.
//!
//! Lossy on the Zervigo side: skills, experience, education, projects and
//! relationships have no user counterpart and are dropped. Talent status
//! `archived` comes back as `inactive`.

use serde_json::{json, Value};

use super::vocab::{
    copy_timestamp, project_status_to_zervigo, require_fields, str_field, strip_id_prefix,
    talent_status_to_zervigo, PROJECT_ID_PREFIX, TALENT_ID_PREFIX,
};
use super::Mapper;
use crate::error::CoreError;
use crate::types::{MapperKey, Payload};

/// `(looma_crm field, zervigo field)` pairs copied by the default mapping.
const DEFAULT_FIELD_TABLE: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "username"),
    ("email", "email"),
    ("phone", "phone"),
    ("status", "status"),
    ("first_name", "first_name"),
    ("last_name", "last_name"),
    ("email_verified", "email_verified"),
    ("phone_verified", "phone_verified"),
    ("role", "role"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct LoomaToZervigo;

impl Mapper for LoomaToZervigo {
    fn name(&self) -> &'static str {
        "looma_crm_to_zervigo"
    }

    fn map(&self, _key: &MapperKey, payload: &Payload) -> Result<Payload, CoreError> {
        let record = payload
            .get("talent")
            .and_then(Value::as_object)
            .unwrap_or(payload);
        match str_field(record, "id") {
            Some(id) if id.starts_with(TALENT_ID_PREFIX) => talent_to_user(record),
            Some(id) if id.starts_with(PROJECT_ID_PREFIX) => project_to_job(record),
            _ => Ok(default_mapping(record)),
        }
    }
}

/// Map a Looma CRM talent back to a Zervigo user.
///
/// The user id comes from `zervigo_user_id` when present, otherwise from the
/// talent id with its prefix stripped.
pub fn talent_to_user(talent: &Payload) -> Result<Payload, CoreError> {
    require_fields("looma_talent_to_user", talent, &["id", "name", "email"])?;

    let mut user = Payload::new();
    user.insert(
        "id".into(),
        native_id(talent, "zervigo_user_id", TALENT_ID_PREFIX),
    );
    user.insert("username".into(), talent["name"].clone());
    user.insert("email".into(), talent["email"].clone());
    user.insert("phone".into(), or_default(talent, "phone", json!("")));
    user.insert("role".into(), or_default(talent, "role", json!("user")));
    let status = str_field(talent, "status").unwrap_or("inactive");
    user.insert("status".into(), json!(talent_status_to_zervigo(status)));
    user.insert("first_name".into(), or_default(talent, "first_name", json!("")));
    user.insert("last_name".into(), or_default(talent, "last_name", json!("")));
    user.insert(
        "email_verified".into(),
        or_default(talent, "email_verified", json!(false)),
    );
    user.insert(
        "phone_verified".into(),
        or_default(talent, "phone_verified", json!(false)),
    );
    copy_timestamp(talent, "created_at", &mut user, "created_at");
    copy_timestamp(talent, "updated_at", &mut user, "updated_at");
    Ok(user)
}

/// Map a Looma CRM project back to a Zervigo job.
pub fn project_to_job(project: &Payload) -> Result<Payload, CoreError> {
    require_fields("looma_project_to_job", project, &["id", "name"])?;

    let mut job = Payload::new();
    job.insert(
        "id".into(),
        native_id(project, "zervigo_job_id", PROJECT_ID_PREFIX),
    );
    job.insert("title".into(), project["name"].clone());
    job.insert("description".into(), or_default(project, "description", json!("")));
    job.insert("requirements".into(), or_default(project, "requirements", json!([])));
    job.insert("skills_needed".into(), or_default(project, "skills_needed", json!([])));
    job.insert("team_size".into(), or_default(project, "team_size", json!(1)));
    job.insert("duration".into(), or_default(project, "duration", json!(1)));
    job.insert("budget".into(), or_default(project, "budget", json!(0)));
    let status = str_field(project, "status").unwrap_or("inactive");
    job.insert("status".into(), json!(project_status_to_zervigo(status)));
    copy_timestamp(project, "created_at", &mut job, "created_at");
    copy_timestamp(project, "updated_at", &mut job, "updated_at");
    Ok(job)
}

/// Field-table copy for records without a recognised id prefix. The id is
/// copied as is.
fn default_mapping(record: &Payload) -> Payload {
    let mut out = Payload::new();
    for (from, to) in DEFAULT_FIELD_TABLE {
        if let Some(value) = record.get(*from).filter(|v| !v.is_null()) {
            out.insert(to.to_string(), value.clone());
        }
    }
    out
}

fn native_id(record: &Payload, link_field: &str, prefix: &str) -> Value {
    match record.get(link_field).filter(|v| !v.is_null()) {
        Some(linked) => linked.clone(),
        None => str_field(record, "id")
            .map(|id| strip_id_prefix(id, prefix))
            .unwrap_or(Value::Null),
    }
}

fn or_default(record: &Payload, field: &str, default: Value) -> Value {
    record
        .get(field)
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or(default)
}
