use std::str::FromStr;
use std::time::Duration;

use crossmap_core::consistency::{
    SeverityTable, DEFAULT_HIGH_SEVERITY_FIELDS, DEFAULT_STALE_TOLERANCE_SECS,
};
use crossmap_core::mapping::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS};
use crossmap_core::repair::DEFAULT_LEDGER_CAPACITY;
use crossmap_core::types::SystemId;
use validator::Validate;

/// Default bound on a single store call.
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Settings out of range: {0}")]
    OutOfRange(#[from] validator::ValidationErrors),

    #[error("Authoritative and replica system are both {0}")]
    SameSystem(SystemId),
}

/// Mapping and repair settings.
///
/// All fields have defaults suitable for local development and tests.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct SyncSettings {
    #[validate(range(min = 1, max = 1_000_000))]
    pub cache_capacity: usize,
    /// 0 disables expiry.
    pub cache_ttl_secs: u64,
    pub stale_tolerance_secs: u64,
    #[validate(range(min = 1, max = 600_000))]
    pub store_timeout_ms: u64,
    pub auto_repair_enabled: bool,
    #[validate(range(min = 10, max = 1_000_000))]
    pub repair_log_capacity: usize,
    pub high_severity_fields: Vec<String>,
    pub medium_severity_fields: Vec<String>,
    /// Source of truth during repair.
    pub authoritative_system: SystemId,
    pub replica_system: SystemId,
}

impl SyncSettings {
    /// Load settings from environment variables with defaults.
    ///
    /// | Env Var                  | Default                        |
    /// |--------------------------|--------------------------------|
    /// | `MAPPING_CACHE_CAPACITY` | `1024`                         |
    /// | `MAPPING_CACHE_TTL_SECS` | `3600`                         |
    /// | `STALE_TOLERANCE_SECS`   | `300`                          |
    /// | `STORE_TIMEOUT_MS`       | `5000`                         |
    /// | `AUTO_REPAIR_ENABLED`    | `true`                         |
    /// | `REPAIR_LOG_CAPACITY`    | `1000`                         |
    /// | `HIGH_SEVERITY_FIELDS`   | `status,email,zervigo_user_id` |
    /// | `MEDIUM_SEVERITY_FIELDS` | (empty)                        |
    /// | `AUTHORITATIVE_SYSTEM`   | `zervigo`                      |
    /// | `REPLICA_SYSTEM`         | `looma_crm`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`SyncSettings::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let settings = Self {
            cache_capacity: parsed(&lookup, "MAPPING_CACHE_CAPACITY", defaults.cache_capacity)?,
            cache_ttl_secs: parsed(&lookup, "MAPPING_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            stale_tolerance_secs: parsed(
                &lookup,
                "STALE_TOLERANCE_SECS",
                defaults.stale_tolerance_secs,
            )?,
            store_timeout_ms: parsed(&lookup, "STORE_TIMEOUT_MS", defaults.store_timeout_ms)?,
            auto_repair_enabled: flag(
                &lookup,
                "AUTO_REPAIR_ENABLED",
                defaults.auto_repair_enabled,
            )?,
            repair_log_capacity: parsed(
                &lookup,
                "REPAIR_LOG_CAPACITY",
                defaults.repair_log_capacity,
            )?,
            high_severity_fields: list(&lookup, "HIGH_SEVERITY_FIELDS")
                .unwrap_or(defaults.high_severity_fields),
            medium_severity_fields: list(&lookup, "MEDIUM_SEVERITY_FIELDS")
                .unwrap_or(defaults.medium_severity_fields),
            authoritative_system: parsed(
                &lookup,
                "AUTHORITATIVE_SYSTEM",
                defaults.authoritative_system,
            )?,
            replica_system: parsed(&lookup, "REPLICA_SYSTEM", defaults.replica_system)?,
        };
        settings.check()?;
        Ok(settings)
    }

    /// Range checks plus the cross-field rules the derive cannot express.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.authoritative_system == self.replica_system {
            return Err(ConfigError::SameSystem(self.replica_system.clone()));
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn severity_table(&self) -> SeverityTable {
        SeverityTable::new(
            self.high_severity_fields.iter().cloned(),
            self.medium_severity_fields.iter().cloned(),
        )
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            stale_tolerance_secs: DEFAULT_STALE_TOLERANCE_SECS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            auto_repair_enabled: true,
            repair_log_capacity: DEFAULT_LEDGER_CAPACITY,
            high_severity_fields: DEFAULT_HIGH_SEVERITY_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            medium_severity_fields: Vec::new(),
            authoritative_system: SystemId::Zervigo,
            replica_system: SystemId::LoomaCrm,
        }
    }
}

fn parsed<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn flag<F>(lookup: &F, var: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::Invalid {
            var,
            value: v,
            reason: "expected a boolean".to_string(),
        }),
    }
}

/// Comma-separated list; an empty variable yields an empty list.
fn list<F>(lookup: &F, var: &str) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}
