//! `crossmap-sync` library crate.
//!
//! Async mapping and repair services over the pure logic in
//! `crossmap-core`, plus the store-adapter boundary they talk through.
//! Re-exports internal modules for integration testing. The sweep binary
//! entrypoint lives in `main.rs`.

pub mod config;
pub mod context;
pub mod error;
pub mod mapping;
pub mod repair;
pub mod store;
pub mod sweep;

pub use config::{ConfigError, SyncSettings};
pub use context::{SyncContext, SyncSnapshot};
pub use error::SyncError;
pub use mapping::MappingService;
pub use repair::RepairService;
pub use store::{EntityStore, InMemoryStore};
