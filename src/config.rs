//! # Repository Configuration
//!
//! The typed shape of the configuration this crate's factory consumes.
//! Loading it (from a file, environment, or CLI flags) is the embedding
//! application's job — out of scope here, per the Non-goals on
//! CLI/bootstrap — but the factory needs a concrete type to accept, so
//! this crate owns the shape and its defaults.

use serde::{Deserialize, Serialize};

/// Which relational engine backs a `RepositoryFactory`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Native-UUID/JSONB backend.
    Postgresql,
    /// Text/epoch-integer backend.
    Sqlite,
}

/// `PRAGMA synchronous` setting for the SQLite backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncMode {
    /// No fsync; fastest, least durable.
    Off,
    /// fsync at critical moments; the default.
    Normal,
    /// fsync on every write; slowest, most durable.
    Full,
}

impl SyncMode {
    /// The SQL fragment this pragma value compiles to.
    #[must_use]
    pub const fn as_pragma_value(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Normal => "NORMAL",
            Self::Full => "FULL",
        }
    }
}

/// Database connection configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Which backend to construct.
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    /// Postgres connection string. Required when `db_type` is
    /// `Postgresql`.
    #[serde(default)]
    pub connection_string: Option<String>,
    /// SQLite file path, or `:memory:`. Required when `db_type` is
    /// `Sqlite`.
    #[serde(default)]
    pub sqlite_file: Option<String>,
    /// `PRAGMA busy_timeout`, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub sqlite_busy_timeout: u64,
    /// `PRAGMA synchronous`.
    #[serde(default = "default_sync_mode")]
    pub sqlite_sync_mode: SyncMode,
    /// `PRAGMA cache_size`, in pages.
    #[serde(default = "default_cache_size_pages")]
    pub sqlite_cache_size: i64,
    /// Maximum pooled connections.
    #[serde(default = "default_pool_max")]
    pub pool_max: u32,
    /// Idle-connection reap timeout, in seconds.
    #[serde(default = "default_idle_timeout_sec")]
    pub idle_timeout_sec: u64,
    /// Connection-acquire timeout, in seconds.
    #[serde(default = "default_connect_timeout_sec")]
    pub connect_timeout_sec: u64,
    /// Maximum lifetime of a pooled connection, in seconds.
    #[serde(default = "default_max_lifetime_sec")]
    pub max_lifetime_sec: u64,
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_sync_mode() -> SyncMode {
    SyncMode::Normal
}

const fn default_cache_size_pages() -> i64 {
    10_000
}

const fn default_pool_max() -> u32 {
    20
}

const fn default_idle_timeout_sec() -> u64 {
    30
}

const fn default_connect_timeout_sec() -> u64 {
    10
}

const fn default_max_lifetime_sec() -> u64 {
    3_600
}

/// In-process read-through cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether repositories handed out by the factory are cache-wrapped.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

const fn default_cache_enabled() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: default_cache_enabled() }
    }
}

/// Top-level configuration consumed by `RepositoryFactory::initialize`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Backend connection settings.
    pub database: DatabaseConfig,
    /// Cache layer settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_specified_knobs() {
        let config = DatabaseConfig {
            db_type: DatabaseType::Sqlite,
            connection_string: None,
            sqlite_file: Some(":memory:".to_string()),
            sqlite_busy_timeout: default_busy_timeout_ms(),
            sqlite_sync_mode: default_sync_mode(),
            sqlite_cache_size: default_cache_size_pages(),
            pool_max: default_pool_max(),
            idle_timeout_sec: default_idle_timeout_sec(),
            connect_timeout_sec: default_connect_timeout_sec(),
            max_lifetime_sec: default_max_lifetime_sec(),
        };
        assert_eq!(config.sqlite_busy_timeout, 5_000);
        assert_eq!(config.sqlite_sync_mode, SyncMode::Normal);
        assert_eq!(config.sqlite_cache_size, 10_000);
        assert_eq!(config.pool_max, 20);
    }

    #[test]
    fn sync_mode_pragma_values() {
        assert_eq!(SyncMode::Off.as_pragma_value(), "OFF");
        assert_eq!(SyncMode::Normal.as_pragma_value(), "NORMAL");
        assert_eq!(SyncMode::Full.as_pragma_value(), "FULL");
    }
}
