use crate::types::MapperKey;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Incomplete mapping input for {mapper}: missing {}", .missing.join(", "))]
    IncompleteMappingInput {
        mapper: &'static str,
        missing: Vec<String>,
    },

    #[error("Mapper not invertible: no mapper resolvable for {key} or its inverse")]
    MapperNotInvertible { key: MapperKey },

    #[error("No mapper registered for {key}")]
    MapperNotFound { key: MapperKey },

    #[error("Repair failed for field {field}: {reason}")]
    RepairApplyFailure { field: String, reason: String },

    #[error("Invalid system id: {0:?}")]
    InvalidSystemId(String),
}
