//! Data validation engine.
//!
//! Provides result types, a pure-logic schema evaluator, cross-field business
//! rules, a fingerprint-keyed result cache, and the [`Validator`] that ties
//! them to a schema registry, all without store dependencies.

pub mod business;
pub mod cache;
pub mod evaluator;
pub mod rules;
mod validator;

pub use cache::ValidationCache;
pub use rules::{FieldViolation, ValidationResult, ValidationSeverity};
pub use validator::Validator;
