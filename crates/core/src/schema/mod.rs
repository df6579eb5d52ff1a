//! Schema registry: per entity type, the recognized fields and their
//! constraints.
//!
//! Pure lookup tables. The validator reads them; nothing here touches data.

mod builtin;

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::error::CoreError;
use crate::validation::rules::ValidationSeverity;

pub use builtin::{
    looma_project_schema, looma_talent_schema, zervigo_job_schema, zervigo_user_schema,
};

// ---------------------------------------------------------------------------
// Entity type constants
// ---------------------------------------------------------------------------

/// Entity type of a Looma CRM talent record.
pub const LOOMA_TALENT: &str = "looma_talent";

/// Entity type of a Looma CRM project record.
pub const LOOMA_PROJECT: &str = "looma_project";

/// Entity type of a Zervigo user record.
pub const ZERVIGO_USER: &str = "zervigo_user";

/// Entity type of a Zervigo job record.
pub const ZERVIGO_JOB: &str = "zervigo_job";

// ---------------------------------------------------------------------------
// Field declarations
// ---------------------------------------------------------------------------

/// Primitive type a field value must conform to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    /// An ISO 8601 string; the format itself is checked by [`Format::IsoDatetime`].
    Datetime,
    Array,
    Object,
}

impl FieldType {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            FieldType::String | FieldType::Datetime => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Datetime => "datetime",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

/// String formats with a fixed, built-in pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Email,
    Phone,
    IsoDatetime,
}

/// Structural checks on nested values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeCheck {
    /// Array of non-blank strings.
    SkillList,
    /// Object with string `degree` and `school`, optional plausible `graduation_year`.
    Education,
    /// Array of objects, each with a string `name`.
    ProjectList,
    /// Array of objects, each with `target_talent_id` and `relationship_type`.
    RelationshipList,
}

/// A single constraint on a declared field.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Numeric bounds. `severity` decides whether a violation blocks.
    Range {
        min: Option<f64>,
        max: Option<f64>,
        severity: ValidationSeverity,
    },
    /// String length bounds in characters.
    Length {
        min: Option<usize>,
        max: Option<usize>,
    },
    /// Fixed set of allowed string values.
    OneOf(Vec<String>),
    /// Regular expression the string form must match.
    Pattern(PatternRule),
    Format(Format),
    /// Upper bound on array length.
    MaxItems {
        max: usize,
        severity: ValidationSeverity,
    },
    Shape(ShapeCheck),
}

impl Constraint {
    pub fn hard_range(min: Option<f64>, max: Option<f64>) -> Self {
        Constraint::Range {
            min,
            max,
            severity: ValidationSeverity::Error,
        }
    }

    pub fn soft_max(max: f64) -> Self {
        Constraint::Range {
            min: None,
            max: Some(max),
            severity: ValidationSeverity::Warning,
        }
    }

    pub fn one_of(values: &[&str]) -> Self {
        Constraint::OneOf(values.iter().map(|v| v.to_string()).collect())
    }

    pub fn pattern(source: &str) -> Self {
        Constraint::Pattern(PatternRule::new(source))
    }

    /// Short rule name used in violation reports.
    pub fn rule_name(&self) -> &'static str {
        match self {
            Constraint::Range { .. } => "range",
            Constraint::Length { .. } => "length",
            Constraint::OneOf(_) => "enum_values",
            Constraint::Pattern(_) => "regex_pattern",
            Constraint::Format(Format::Email) => "email_format",
            Constraint::Format(Format::Phone) => "phone_format",
            Constraint::Format(Format::IsoDatetime) => "datetime_format",
            Constraint::MaxItems { .. } => "max_items",
            Constraint::Shape(_) => "shape",
        }
    }
}

/// A regular expression compiled once, when the schema is built.
///
/// A source that fails to compile leaves `regex` empty and the rule accepts
/// every value.
#[derive(Debug, Clone)]
pub struct PatternRule {
    source: String,
    regex: Option<Regex>,
}

impl PatternRule {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            regex: Regex::new(source).ok(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }
}

impl PartialEq for PatternRule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Declaration of one recognized field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConstraint {
    pub name: String,
    pub required: bool,
    pub field_type: FieldType,
    pub constraints: Vec<Constraint>,
}

impl FieldConstraint {
    pub fn required(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_string(),
            required: true,
            field_type,
            constraints: Vec::new(),
        }
    }

    pub fn optional(name: &str, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, field_type)
        }
    }

    pub fn with(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }
}

/// The full field set of one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    pub entity_type: String,
    pub fields: Vec<FieldConstraint>,
}

impl EntitySchema {
    pub fn new(entity_type: &str, fields: Vec<FieldConstraint>) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldConstraint> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn declares(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lookup table from entity type name to its schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, EntitySchema>,
}

impl SchemaRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the Zervigo and Looma CRM schemas.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(looma_talent_schema());
        registry.register(looma_project_schema());
        registry.register(zervigo_user_schema());
        registry.register(zervigo_job_schema());
        registry
    }

    /// Add a schema, replacing any previous schema of the same entity type.
    pub fn register(&mut self, schema: EntitySchema) {
        self.schemas.insert(schema.entity_type.clone(), schema);
    }

    pub fn get_schema(&self, entity_type: &str) -> Result<&EntitySchema, CoreError> {
        self.schemas
            .get(entity_type)
            .ok_or_else(|| CoreError::UnknownEntityType(entity_type.to_string()))
    }

    /// Field names declared by both schemas, in the order of `a`.
    pub fn common_fields(&self, a: &str, b: &str) -> Result<Vec<String>, CoreError> {
        let left = self.get_schema(a)?;
        let right = self.get_schema(b)?;
        Ok(left
            .fields
            .iter()
            .filter(|f| right.declares(&f.name))
            .map(|f| f.name.clone())
            .collect())
    }

    /// Registered entity types, sorted.
    pub fn entity_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
