//! Timestamp parsing shared by the validator, the mappers and the
//! consistency checker.
//!
//! Stores disagree on formats: some emit RFC 3339 with an offset or `Z`,
//! others a naive ISO 8601 string. Naive values are taken as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::types::Timestamp;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO 8601 timestamp, with or without an offset.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Canonical RFC 3339 rendering, or `None` if `raw` does not parse.
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|dt| dt.to_rfc3339())
}
