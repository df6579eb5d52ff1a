//! `crossmap-core`: pure logic for mapping, validating and reconciling
//! records held by Zervigo and Looma CRM.
//!
//! No I/O and no logging. The async services in `crossmap-sync` drive these
//! types against real stores.

pub mod audit;
pub mod consistency;
pub mod datetime;
pub mod error;
pub mod hashing;
pub mod mapping;
pub mod repair;
pub mod schema;
pub mod types;
pub mod validation;

pub use error::CoreError;
pub use types::{EntityView, MapperKey, Payload, SystemId, Timestamp};
