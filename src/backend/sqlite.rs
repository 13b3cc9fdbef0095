use std::str::FromStr;
use std::time::Instant;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::backend::{BackendHealth, HealthTracker};
use crate::config::DatabaseConfig;
use crate::error::RepoError;
use crate::schema::SQLITE_STATEMENTS;

/// Connection manager for the text/epoch-integer backend.
pub struct SqliteBackend {
    pub(crate) pool: SqlitePool,
    tracker: HealthTracker,
    file: String,
}

impl SqliteBackend {
    /// Open the pool described by `config.sqlite_file`, apply the
    /// `busy_timeout`/`synchronous`/`cache_size`/`foreign_keys` pragmas,
    /// and run the schema migration.
    ///
    /// `:memory:` databases are pinned to a single pooled connection so
    /// the schema and data survive across pool checkouts (SQLite's
    /// in-memory databases are per-connection unless shared-cache is
    /// used, and a pool of independent `:memory:` connections would each
    /// see an empty, unrelated database).
    #[instrument(level = "debug", skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepoError> {
        let file = config
            .sqlite_file
            .clone()
            .ok_or_else(|| RepoError::Validation("database.sqliteFile is required for sqlite".to_string()))?;

        tracing::debug!(file = %file, "connecting to sqlite backend");

        let is_memory = file == ":memory:";
        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite:{file}"))
            .map_err(|e| RepoError::Validation(format!("invalid sqlite file {file:?}: {e}")))?
            .create_if_missing(true)
            .busy_timeout(std::time::Duration::from_millis(config.sqlite_busy_timeout))
            .synchronous(sync_mode_for(config.sqlite_sync_mode))
            .foreign_keys(true)
            .pragma("cache_size", config.sqlite_cache_size.to_string());

        let pool = SqlitePoolOptions::new()
            .max_connections(if is_memory { 1 } else { config.pool_max })
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_sec))
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_sec))
            .max_lifetime(std::time::Duration::from_secs(config.max_lifetime_sec))
            .connect_with(connect_options)
            .await
            .map_err(|e| RepoError::BackendUnavailable(format!("sqlite connect failed: {e}")))?;

        for statement in SQLITE_STATEMENTS {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool, tracker: HealthTracker::new(), file })
    }

    pub(crate) async fn health(&self) -> BackendHealth {
        self.tracker.record_attempt();
        let start = Instant::now();
        let probe = sqlx::query("SELECT 1").execute(&self.pool).await;
        let response_time_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        BackendHealth {
            connected: probe.is_ok(),
            response_time_ms,
            uptime_ms: self.tracker.uptime_ms(),
            connection_attempts: self.tracker.attempts(),
            last_error: probe.err().map(|e| e.to_string()),
            configuration: format!("sqlite file={}", self.file),
        }
    }
}

fn sync_mode_for(mode: crate::config::SyncMode) -> sqlx::sqlite::SqliteSynchronous {
    match mode {
        crate::config::SyncMode::Off => sqlx::sqlite::SqliteSynchronous::Off,
        crate::config::SyncMode::Normal => sqlx::sqlite::SqliteSynchronous::Normal,
        crate::config::SyncMode::Full => sqlx::sqlite::SqliteSynchronous::Full,
    }
}
