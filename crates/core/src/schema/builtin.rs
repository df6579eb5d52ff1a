//! Built-in schemas for the Zervigo and Looma CRM record shapes.

use super::{
    Constraint, EntitySchema, FieldConstraint, FieldType, Format, ShapeCheck, LOOMA_PROJECT,
    LOOMA_TALENT, ZERVIGO_JOB, ZERVIGO_USER,
};
use crate::validation::rules::ValidationSeverity;

/// Largest native identifier either system hands out.
const MAX_NATIVE_ID: f64 = 999_999_999.0;

/// Experience above this many years is flagged but accepted.
const MAX_PLAUSIBLE_EXPERIENCE_YEARS: f64 = 50.0;

/// More skills than this is flagged but accepted.
const MAX_PLAUSIBLE_SKILLS: usize = 50;

fn timestamp(name: &str) -> FieldConstraint {
    FieldConstraint::optional(name, FieldType::Datetime)
        .with(Constraint::Format(Format::IsoDatetime))
}

fn email() -> FieldConstraint {
    FieldConstraint::required("email", FieldType::String)
        .with(Constraint::Format(Format::Email))
        .with(Constraint::Length {
            min: None,
            max: Some(255),
        })
}

fn native_id(name: &str) -> FieldConstraint {
    FieldConstraint::required(name, FieldType::Integer)
        .with(Constraint::hard_range(Some(1.0), Some(MAX_NATIVE_ID)))
}

pub fn looma_talent_schema() -> EntitySchema {
    EntitySchema::new(
        LOOMA_TALENT,
        vec![
            FieldConstraint::required("id", FieldType::String)
                .with(Constraint::pattern(r"^[a-zA-Z_][a-zA-Z0-9_]*$"))
                .with(Constraint::Length {
                    min: None,
                    max: Some(100),
                }),
            FieldConstraint::required("name", FieldType::String).with(Constraint::Length {
                min: Some(1),
                max: Some(100),
            }),
            email(),
            FieldConstraint::optional("phone", FieldType::String)
                .with(Constraint::Format(Format::Phone))
                .with(Constraint::Length {
                    min: None,
                    max: Some(20),
                }),
            FieldConstraint::optional("skills", FieldType::Array)
                .with(Constraint::Shape(ShapeCheck::SkillList))
                .with(Constraint::MaxItems {
                    max: MAX_PLAUSIBLE_SKILLS,
                    severity: ValidationSeverity::Warning,
                }),
            FieldConstraint::optional("experience", FieldType::Integer)
                .with(Constraint::hard_range(Some(0.0), None))
                .with(Constraint::soft_max(MAX_PLAUSIBLE_EXPERIENCE_YEARS)),
            FieldConstraint::optional("education", FieldType::Object)
                .with(Constraint::Shape(ShapeCheck::Education)),
            FieldConstraint::optional("projects", FieldType::Array)
                .with(Constraint::Shape(ShapeCheck::ProjectList)),
            FieldConstraint::optional("relationships", FieldType::Array)
                .with(Constraint::Shape(ShapeCheck::RelationshipList)),
            FieldConstraint::optional("status", FieldType::String)
                .with(Constraint::one_of(&["active", "inactive", "archived"])),
            timestamp("created_at"),
            timestamp("updated_at"),
            native_id("zervigo_user_id"),
        ],
    )
}

pub fn looma_project_schema() -> EntitySchema {
    EntitySchema::new(
        LOOMA_PROJECT,
        vec![
            FieldConstraint::required("id", FieldType::String)
                .with(Constraint::pattern(r"^[a-zA-Z_][a-zA-Z0-9_]*$")),
            FieldConstraint::required("name", FieldType::String).with(Constraint::Length {
                min: Some(1),
                max: Some(200),
            }),
            FieldConstraint::optional("description", FieldType::String),
            FieldConstraint::optional("requirements", FieldType::Array),
            FieldConstraint::optional("skills_needed", FieldType::Array)
                .with(Constraint::Shape(ShapeCheck::SkillList)),
            FieldConstraint::optional("team_size", FieldType::Integer)
                .with(Constraint::hard_range(Some(1.0), None)),
            FieldConstraint::optional("duration", FieldType::Integer)
                .with(Constraint::hard_range(Some(1.0), None)),
            FieldConstraint::optional("status", FieldType::String).with(Constraint::one_of(&[
                "planning",
                "active",
                "completed",
                "cancelled",
            ])),
            timestamp("created_at"),
            timestamp("updated_at"),
        ],
    )
}

pub fn zervigo_user_schema() -> EntitySchema {
    EntitySchema::new(
        ZERVIGO_USER,
        vec![
            native_id("id"),
            FieldConstraint::required("username", FieldType::String)
                .with(Constraint::Length {
                    min: Some(3),
                    max: Some(50),
                })
                .with(Constraint::pattern(r"^[a-zA-Z0-9_]+$")),
            email(),
            FieldConstraint::optional("role", FieldType::String)
                .with(Constraint::one_of(&["admin", "user", "manager", "hr"])),
            FieldConstraint::optional("status", FieldType::String).with(Constraint::one_of(&[
                "active",
                "inactive",
                "pending",
                "suspended",
            ])),
            timestamp("created_at"),
            timestamp("updated_at"),
        ],
    )
}

pub fn zervigo_job_schema() -> EntitySchema {
    EntitySchema::new(
        ZERVIGO_JOB,
        vec![
            native_id("id"),
            FieldConstraint::required("title", FieldType::String).with(Constraint::Length {
                min: Some(1),
                max: Some(200),
            }),
            FieldConstraint::optional("description", FieldType::String),
            FieldConstraint::optional("status", FieldType::String).with(Constraint::one_of(&[
                "active",
                "inactive",
                "pending",
                "completed",
            ])),
            timestamp("created_at"),
            timestamp("updated_at"),
        ],
    )
}
