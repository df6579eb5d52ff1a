//! Zervigo → Looma CRM mapper.
//!
//! Dispatches on an envelope key: `{"user": …}`, `{"job": …}` or
//! `{"resume": …}`. A bare payload is treated as a user record.
//!
//! Lossy on the Looma side: talent fields Zervigo does not hold (phone,
//! skills, experience, education, projects, relationships) come out empty and
//! must be filled from the resume/project/graph stores.

use std::collections::BTreeSet;

use serde_json::{json, Value};

use super::vocab::{
    copy_auth_fields, copy_timestamp, id_string, job_status_to_looma, require_fields, str_field,
    user_status_to_looma, PROJECT_ID_PREFIX, TALENT_ID_PREFIX,
};
use super::Mapper;
use crate::error::CoreError;
use crate::types::{MapperKey, Payload};

/// Summed experience is capped at this many years.
const MAX_EXPERIENCE_YEARS: u64 = 50;

/// Team size assumed for a project created from a job posting.
const DEFAULT_TEAM_SIZE: u64 = 1;

/// Duration in months assumed for a project created from a job posting.
const DEFAULT_DURATION_MONTHS: u64 = 6;

#[derive(Debug, Default, Clone, Copy)]
pub struct ZervigoToLooma;

impl Mapper for ZervigoToLooma {
    fn name(&self) -> &'static str {
        "zervigo_to_looma_crm"
    }

    fn map(&self, _key: &MapperKey, payload: &Payload) -> Result<Payload, CoreError> {
        if let Some(user) = payload.get("user").and_then(Value::as_object) {
            user_to_talent(user)
        } else if let Some(job) = payload.get("job").and_then(Value::as_object) {
            job_to_project(job)
        } else if let Some(resume) = payload.get("resume").and_then(Value::as_object) {
            resume_to_talent_skills(resume)
        } else {
            user_to_talent(payload)
        }
    }
}

/// Map a Zervigo user to a Looma CRM talent.
///
/// The talent id is `talent_<user id>`, so re-mapping the same user always
/// yields the same id.
pub fn user_to_talent(user: &Payload) -> Result<Payload, CoreError> {
    require_fields("zervigo_user_to_talent", user, &["id", "username", "email"])?;
    let native_id = &user["id"];

    let mut talent = Payload::new();
    talent.insert(
        "id".into(),
        json!(format!("{TALENT_ID_PREFIX}{}", id_string(native_id))),
    );
    talent.insert("name".into(), user["username"].clone());
    talent.insert("email".into(), user["email"].clone());
    talent.insert("phone".into(), json!(""));
    talent.insert("skills".into(), json!([]));
    talent.insert("experience".into(), json!(0));
    talent.insert("education".into(), json!({}));
    talent.insert("projects".into(), json!([]));
    talent.insert("relationships".into(), json!([]));
    let status = str_field(user, "status").unwrap_or("inactive");
    talent.insert("status".into(), json!(user_status_to_looma(status)));
    copy_timestamp(user, "created_at", &mut talent, "created_at");
    copy_timestamp(user, "updated_at", &mut talent, "updated_at");
    copy_auth_fields(user, &mut talent);
    talent.insert("zervigo_user_id".into(), native_id.clone());
    Ok(talent)
}

/// Map a Zervigo job posting to a Looma CRM project.
pub fn job_to_project(job: &Payload) -> Result<Payload, CoreError> {
    require_fields("zervigo_job_to_project", job, &["id", "title"])?;
    let native_id = &job["id"];
    let requirements = job.get("requirements").unwrap_or(&Value::Null);

    let mut project = Payload::new();
    project.insert(
        "id".into(),
        json!(format!("{PROJECT_ID_PREFIX}{}", id_string(native_id))),
    );
    project.insert("name".into(), job["title"].clone());
    project.insert(
        "description".into(),
        json!(str_field(job, "description").unwrap_or_default()),
    );
    project.insert("requirements".into(), json!(requirement_names(requirements)));
    project.insert("skills_needed".into(), json!(requirement_skills(requirements)));
    project.insert("team_size".into(), json!(DEFAULT_TEAM_SIZE));
    project.insert("duration".into(), json!(DEFAULT_DURATION_MONTHS));
    project.insert("budget".into(), Value::Null);
    let status = str_field(job, "status").unwrap_or("inactive");
    project.insert("status".into(), json!(job_status_to_looma(status)));
    copy_timestamp(job, "created_at", &mut project, "created_at");
    if job.get("updated_at").is_some_and(|v| !v.is_null()) {
        copy_timestamp(job, "updated_at", &mut project, "updated_at");
    } else {
        copy_timestamp(job, "created_at", &mut project, "updated_at");
    }
    project.insert("zervigo_job_id".into(), native_id.clone());
    Ok(project)
}

/// Extract talent skill data from a parsed Zervigo resume.
pub fn resume_to_talent_skills(resume: &Payload) -> Result<Payload, CoreError> {
    require_fields("zervigo_resume_to_skills", resume, &["id", "user_id", "parsed_data"])?;
    let empty = Payload::new();
    let parsed = resume["parsed_data"].as_object().unwrap_or(&empty);

    let mut skills = Payload::new();
    skills.insert("skills".into(), json!(resume_skills(parsed)));
    skills.insert("experience".into(), json!(experience_years(parsed)));
    skills.insert("education".into(), highest_education(parsed));
    skills.insert("projects".into(), json!(resume_projects(parsed)));
    Ok(skills)
}

fn requirement_names(requirements: &Value) -> Vec<Value> {
    match requirements {
        Value::Object(map) => map.keys().map(|k| json!(k)).collect(),
        Value::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}

/// Skills listed under requirement keys mentioning "skill" or "technology".
fn requirement_skills(requirements: &Value) -> Vec<String> {
    let mut skills = BTreeSet::new();
    if let Value::Object(map) = requirements {
        for (key, value) in map {
            let key = key.to_lowercase();
            if !(key.contains("skill") || key.contains("technology")) {
                continue;
            }
            match value {
                Value::Array(items) => skills.extend(items.iter().map(value_text)),
                other => {
                    skills.insert(value_text(other));
                }
            }
        }
    }
    skills.into_iter().collect()
}

fn resume_skills(parsed: &Payload) -> Vec<String> {
    let mut skills = BTreeSet::new();
    match parsed.get("skills") {
        Some(Value::Array(items)) => skills.extend(items.iter().filter_map(text)),
        Some(Value::Object(map)) => skills.extend(map.keys().cloned()),
        _ => {}
    }
    if let Some(Value::Array(jobs)) = parsed.get("experience") {
        for job in jobs {
            if let Some(Value::Array(items)) = job.get("skills") {
                skills.extend(items.iter().filter_map(text));
            }
        }
    }
    skills.into_iter().collect()
}

/// Sum of "N years" durations across experience entries, capped.
fn experience_years(parsed: &Payload) -> u64 {
    let Some(Value::Array(jobs)) = parsed.get("experience") else {
        return 0;
    };
    jobs.iter()
        .filter_map(|job| job.get("duration").and_then(Value::as_str))
        .filter(|d| d.to_lowercase().contains("year"))
        .filter_map(leading_number)
        .fold(0, u64::saturating_add)
        .min(MAX_EXPERIENCE_YEARS)
}

/// First run of ASCII digits in `s`.
fn leading_number(s: &str) -> Option<u64> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let digits: String = s[start..].chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// The first education entry, which resumes list highest first.
fn highest_education(parsed: &Payload) -> Value {
    let first = parsed
        .get("education")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
        .and_then(Value::as_object);
    match first {
        Some(edu) => json!({
            "degree": str_field(edu, "degree").unwrap_or_default(),
            "school": str_field(edu, "school").unwrap_or_default(),
            "major": str_field(edu, "major").unwrap_or_default(),
            "graduation_year": edu.get("year").cloned().unwrap_or(Value::Null),
        }),
        None => json!({}),
    }
}

fn resume_projects(parsed: &Payload) -> Vec<Value> {
    let Some(Value::Array(projects)) = parsed.get("projects") else {
        return Vec::new();
    };
    projects
        .iter()
        .filter_map(Value::as_object)
        .map(|p| {
            json!({
                "name": str_field(p, "name").unwrap_or_default(),
                "description": str_field(p, "description").unwrap_or_default(),
                "technologies": p.get("technologies").cloned().unwrap_or_else(|| json!([])),
                "duration": str_field(p, "duration").unwrap_or_default(),
                "role": str_field(p, "role").unwrap_or_default(),
            })
        })
        .collect()
}

fn text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn value_text(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}
