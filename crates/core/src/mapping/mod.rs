//! Directional mappers between system representations, the registry that
//! resolves them, and the fingerprint-keyed result cache.
//!
//! Everything here is synchronous and store-free; the async mapping service
//! in `crossmap-sync` wraps the registry and cache behind locks.

pub mod cache;
pub mod fallback;
pub mod looma;
pub mod registry;
pub mod vocab;
pub mod zervigo;

use std::fmt;

use crate::error::CoreError;
use crate::types::{MapperKey, Payload};

pub use cache::{CacheStats, MappingCache};
pub use fallback::AliasMapper;
pub use looma::LoomaToZervigo;
pub use registry::MapperRegistry;
pub use zervigo::ZervigoToLooma;

/// A directional transformation from one system's shape to another's.
///
/// `key` is the registry key the mapper was resolved under, so a shared
/// mapper (the fallback) can adapt to the direction it is used in.
pub trait Mapper: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn map(&self, key: &MapperKey, payload: &Payload) -> Result<Payload, CoreError>;
}
