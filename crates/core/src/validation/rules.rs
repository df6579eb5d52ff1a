//! Validation result types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Whether a rule violation blocks a write or is informational.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
}

/// Aggregated result of validating one record (or comparing two).
///
/// `is_valid` is false exactly when `errors` is non-empty. Build results with
/// [`ValidationResult::valid`] and the `push_*` methods to keep that true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<FieldViolation>,
    pub warnings: Vec<FieldViolation>,
}

impl ValidationResult {
    /// A result with no violations.
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn from_violations(errors: Vec<FieldViolation>, warnings: Vec<FieldViolation>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn push(&mut self, severity: ValidationSeverity, violation: FieldViolation) {
        match severity {
            ValidationSeverity::Error => self.push_error(violation),
            ValidationSeverity::Warning => self.push_warning(violation),
        }
    }

    pub fn push_error(&mut self, violation: FieldViolation) {
        self.errors.push(violation);
        self.is_valid = false;
    }

    /// Warnings never affect `is_valid`.
    pub fn push_warning(&mut self, violation: FieldViolation) {
        self.warnings.push(violation);
    }

    /// Append another result's violations after this one's.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.is_valid = self.errors.is_empty();
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Error messages in order, for logs and failure details.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// A single field-level rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub rule_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl FieldViolation {
    pub fn new(field: &str, rule_type: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            rule_type: rule_type.to_string(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: Option<&serde_json::Value>) -> Self {
        self.value = value.cloned();
        self
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
