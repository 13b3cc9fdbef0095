use std::time::Instant;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::instrument;

use crate::backend::{BackendHealth, HealthTracker};
use crate::config::DatabaseConfig;
use crate::error::RepoError;
use crate::schema::POSTGRES_STATEMENTS;

/// Connection manager for the native-UUID/JSONB backend.
pub struct PostgresBackend {
    pub(crate) pool: PgPool,
    tracker: HealthTracker,
    max_connections: u32,
}

impl PostgresBackend {
    /// Open the pool described by `config.connection_string` and apply
    /// the schema migration.
    #[instrument(level = "debug", skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, RepoError> {
        let connection_string = config.connection_string.as_deref().ok_or_else(|| {
            RepoError::Validation("database.connectionString is required for postgresql".to_string())
        })?;

        tracing::debug!("connecting to postgres backend");

        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_sec))
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_sec))
            .max_lifetime(std::time::Duration::from_secs(config.max_lifetime_sec))
            .connect(connection_string)
            .await
            .map_err(|e| RepoError::BackendUnavailable(format!("postgres connect failed: {e}")))?;

        for statement in POSTGRES_STATEMENTS {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool, tracker: HealthTracker::new(), max_connections: config.pool_max })
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
            configuration: format!("postgres pool (max_connections={})", self.max_connections),
        }
    }
}
