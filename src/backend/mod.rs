//! # Backend Connection Manager
//!
//! Owns the connection/pool lifecycle for whichever relational engine a
//! `RepositoryConfig` selects, applies engine-specific pragmas, exposes a
//! health probe, and provides the transaction primitive repositories
//! build on.

mod postgres;
mod sqlite;

pub use postgres::PostgresBackend;
pub use sqlite::SqliteBackend;

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use crate::config::{DatabaseConfig, DatabaseType};
use crate::error::RepoError;

/// Diagnostics surface exposed to external collaborators.
#[derive(Clone, Debug)]
pub struct BackendHealth {
    /// Whether the most recent probe succeeded.
    pub connected: bool,
    /// Round-trip time of the probe, in milliseconds.
    pub response_time_ms: u64,
    /// How long this backend has been open, in milliseconds.
    pub uptime_ms: u64,
    /// Total number of connection attempts made since construction.
    pub connection_attempts: u32,
    /// The last error observed, if any.
    pub last_error: Option<String>,
    /// A redacted summary of the active configuration (never
    /// credentials).
    pub configuration: String,
}

/// Tracks attempt counters and start time shared by both backend
/// implementations.
pub(crate) struct HealthTracker {
    started_at: Instant,
    connection_attempts: AtomicU32,
}

impl HealthTracker {
    pub(crate) fn new() -> Self {
        Self { started_at: Instant::now(), connection_attempts: AtomicU32::new(1) }
    }

    pub(crate) fn record_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn uptime_ms(&self) -> u64 {
        u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub(crate) fn attempts(&self) -> u32 {
        self.connection_attempts.load(Ordering::Relaxed)
    }
}

/// An open transaction against either backend. Queries within it are
/// issued through the repository/status-engine code that owns the
/// transaction, which matches on the variant to pick the right SQL
/// dialect.
pub enum DbTx<'a> {
    /// A transaction against the Postgres backend.
    Postgres(sqlx::Transaction<'a, sqlx::Postgres>),
    /// A transaction against the SQLite backend.
    Sqlite(sqlx::Transaction<'a, sqlx::Sqlite>),
}

impl DbTx<'_> {
    /// Commit the transaction.
    pub async fn commit(self) -> Result<(), RepoError> {
        match self {
            Self::Postgres(tx) => tx.commit().await.map_err(RepoError::from),
            Self::Sqlite(tx) => tx.commit().await.map_err(RepoError::from),
        }
    }

    /// Roll the transaction back. Any error thrown mid-transaction takes
    /// this path; there are no silent retries at this layer.
    pub async fn rollback(self) -> Result<(), RepoError> {
        match self {
            Self::Postgres(tx) => tx.rollback().await.map_err(RepoError::from),
            Self::Sqlite(tx) => tx.rollback().await.map_err(RepoError::from),
        }
    }
}

/// A boxed, transaction-scoped future, used by `DbBackend::transaction`
/// so callers can write ordinary `async` closures.
pub type TxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepoError>> + Send + 'a>>;

/// The backend capability set exposed to repositories: execute a
/// transaction, probe health, and release resources on shutdown.
/// Concrete variants are `PostgresBackend` and `SqliteBackend`, unified
/// behind `DbBackend` so repositories are written once and dispatch on
/// the active variant only where the SQL dialect actually differs.
pub enum DbBackend {
    /// Native-UUID/JSONB backend.
    Postgres(PostgresBackend),
    /// Text/epoch-integer backend.
    Sqlite(SqliteBackend),
}

impl DbBackend {
    /// Construct and connect the backend selected by `config`, applying
    /// pragmas and running the schema migration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepoError> {
        match config.db_type {
            DatabaseType::Postgresql => Ok(Self::Postgres(PostgresBackend::connect(config).await?)),
            DatabaseType::Sqlite => Ok(Self::Sqlite(SqliteBackend::connect(config).await?)),
        }
    }

    /// Begin a new transaction. Nesting: on Postgres this is a true
    /// savepoint-capable nested transaction if the caller begins another
    /// one from within; on SQLite, which lacks usable nested
    /// transactions for this crate's access pattern, callers must not
    /// begin a second transaction from inside an open one — the single
    /// outer transaction enforced by repository code is sufficient,
    /// since every multi-statement operation in this crate opens exactly
    /// one transaction at its own entry point.
    pub async fn begin(&self) -> Result<DbTx<'_>, RepoError> {
        match self {
            Self::Postgres(backend) => Ok(DbTx::Postgres(backend.pool.begin().await?)),
            Self::Sqlite(backend) => Ok(DbTx::Sqlite(backend.pool.begin().await?)),
        }
    }

    /// Probe connectivity with a lightweight `SELECT 1`.
    pub async fn health(&self) -> BackendHealth {
        match self {
            Self::Postgres(backend) => backend.health().await,
            Self::Sqlite(backend) => backend.health().await,
        }
    }

    /// `true` iff the most recent health probe succeeded.
    pub async fn is_connected(&self) -> bool {
        self.health().await.connected
    }

    /// Release pooled resources.
    pub async fn close(&self) {
        match self {
            Self::Postgres(backend) => backend.pool.close().await,
            Self::Sqlite(backend) => backend.pool.close().await,
        }
    }
}
