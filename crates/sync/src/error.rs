use crossmap_core::error::CoreError;
use crossmap_core::types::SystemId;

use crate::config::ConfigError;

/// Errors surfaced by the mapping and repair services.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Store error ({system}): {message}")]
    Store { system: SystemId, message: String },

    #[error("Store timeout ({system}) after {timeout_ms}ms during {operation}")]
    StoreTimeout {
        system: SystemId,
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("View not found: {entity_id} in {system}")]
    ViewNotFound { system: SystemId, entity_id: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
