//! Field-copy mapper used for system pairs without an explicit mapper.

use super::vocab::{require_fields, FIELD_ALIASES};
use super::Mapper;
use crate::error::CoreError;
use crate::types::{MapperKey, Payload, SystemId};

/// Copies every non-null field, renaming alias pairs toward the target
/// system's vocabulary. Requires a non-null `id`.
///
/// One instance is shared by every key it is registered under; the
/// direction comes from the key passed to [`Mapper::map`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AliasMapper;

impl AliasMapper {
    fn rename<'a>(target: &SystemId, field: &'a str) -> &'a str {
        let alias = match target {
            SystemId::Zervigo => FIELD_ALIASES
                .iter()
                .find(|(_, looma)| *looma == field)
                .map(|(zervigo, _)| *zervigo),
            SystemId::LoomaCrm => FIELD_ALIASES
                .iter()
                .find(|(zervigo, _)| *zervigo == field)
                .map(|(_, looma)| *looma),
            SystemId::Other(_) => None,
        };
        alias.unwrap_or(field)
    }
}

impl Mapper for AliasMapper {
    fn name(&self) -> &'static str {
        "alias_fallback"
    }

    fn map(&self, key: &MapperKey, payload: &Payload) -> Result<Payload, CoreError> {
        require_fields(self.name(), payload, &["id"])?;
        Ok(payload
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (Self::rename(&key.target, k).to_string(), v.clone()))
            .collect())
    }
}
