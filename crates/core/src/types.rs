use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// An already-decoded key/value record as handed over by a store adapter.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Identifier of a backing system that holds a representation of an entity.
///
/// The two systems this crate knows how to map between are named variants;
/// any other system is carried as [`SystemId::Other`] and handled by the
/// fallback mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SystemId {
    Zervigo,
    LoomaCrm,
    Other(String),
}

impl SystemId {
    pub fn as_str(&self) -> &str {
        match self {
            SystemId::Zervigo => "zervigo",
            SystemId::LoomaCrm => "looma_crm",
            SystemId::Other(name) => name,
        }
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemId {
    type Err = CoreError;

    /// Accepts snake_case names; `looma` is an alias of `looma_crm`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "" => Err(CoreError::InvalidSystemId(s.to_string())),
            "zervigo" => Ok(SystemId::Zervigo),
            "looma_crm" | "looma" => Ok(SystemId::LoomaCrm),
            _ if name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') =>
            {
                Ok(SystemId::Other(name))
            }
            _ => Err(CoreError::InvalidSystemId(s.to_string())),
        }
    }
}

impl Serialize for SystemId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SystemId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Directional lookup key for the mapper registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapperKey {
    pub source: SystemId,
    pub target: SystemId,
}

impl MapperKey {
    pub fn new(source: SystemId, target: SystemId) -> Self {
        Self { source, target }
    }

    /// The key for the opposite direction.
    pub fn inverse(&self) -> Self {
        Self {
            source: self.target.clone(),
            target: self.source.clone(),
        }
    }
}

impl fmt::Display for MapperKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_to_{}", self.source, self.target)
    }
}

/// One system's representation of a logical entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityView {
    pub system: SystemId,
    /// Schema name used for validation, e.g. `"looma_talent"`.
    pub entity_type: String,
    pub fields: Payload,
}

impl EntityView {
    pub fn new(system: SystemId, entity_type: impl Into<String>, fields: Payload) -> Self {
        Self {
            system,
            entity_type: entity_type.into(),
            fields,
        }
    }
}
