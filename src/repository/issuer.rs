use std::sync::Arc;

use tracing::instrument;

use crate::backend::DbBackend;
use crate::convert::{json_to_text, Iri};
use crate::error::RepoError;
use crate::mapper::issuer as issuer_mapper;
use crate::model::{Issuer, IssuerPatch, NewIssuer};
use crate::repository::base::{OperationLog, Pagination};

const ENTITY: &str = "Issuer";

/// CRUD and listing operations over the `issuers` table, dispatching to
/// the active backend's SQL dialect.
pub struct IssuerRepository {
    backend: Arc<DbBackend>,
}

impl IssuerRepository {
    /// Build a repository over the given backend.
    #[must_use]
    pub const fn new(backend: Arc<DbBackend>) -> Self {
        Self { backend }
    }

    /// Insert a new issuer.
    #[instrument(level = "debug", skip(self, new))]
    pub async fn create(&self, new: NewIssuer) -> Result<Issuer, RepoError> {
        let log = OperationLog::start("create", ENTITY);
        let issuer = match new.into_entity() {
            Ok(issuer) => issuer,
            Err(e) => {
                log.finish_err("<pending>", &e);
                return Err(e);
            }
        };

        let result = match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                sqlx::query(
                    "INSERT INTO issuers (id, name, url, email, description, image, public_key, \
                     additional_fields, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                )
                .bind(uuid::Uuid::parse_str(issuer.id.as_str()).map_err(|e| RepoError::Internal(e.to_string()))?)
                .bind(&issuer.name)
                .bind(issuer.url.as_str())
                .bind(&issuer.email)
                .bind(&issuer.description)
                .bind(issuer.image.as_ref().map(crate::convert::ImageRef::to_json).transpose()?)
                .bind(&issuer.public_key)
                .bind(serde_json::Value::Object(issuer.additional_fields.clone()))
                .bind(issuer.created_at.as_datetime())
                .bind(issuer.updated_at.as_datetime())
                .execute(&backend.pool)
                .await
            }
            DbBackend::Sqlite(backend) => {
                sqlx::query(
                    "INSERT INTO issuers (id, name, url, email, description, image, public_key, \
                     additional_fields, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(issuer.id.as_str())
                .bind(json_to_text(&issuer.name))
                .bind(issuer.url.as_str())
                .bind(&issuer.email)
                .bind(&issuer.description)
                .bind(issuer.image.as_ref().map(|i| i.to_json().map(|v| json_to_text(&v))).transpose()?)
                .bind(issuer.public_key.as_ref().map(json_to_text))
                .bind(json_to_text(&serde_json::Value::Object(issuer.additional_fields.clone())))
                .bind(issuer.created_at.to_epoch_millis())
                .bind(issuer.updated_at.to_epoch_millis())
                .execute(&backend.pool)
                .await
            }
        };

        match result {
            Ok(rows) => {
                log.finish_ok(issuer.id.as_str(), rows.rows_affected());
                Ok(issuer)
            }
            Err(e) => {
                let err = RepoError::from(e);
                log.finish_err(issuer.id.as_str(), &err);
                Err(err)
            }
        }
    }

    /// Look up an issuer by id. A miss is `Ok(None)`, never an error.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_id(&self, id: &Iri) -> Result<Option<Issuer>, RepoError> {
        let log = OperationLog::start("find_by_id", ENTITY);
        let result = self.fetch_row(id).await;
        match &result {
            Ok(Some(_)) => log.finish_ok(id.as_str(), 1),
            Ok(None) => log.finish_ok(id.as_str(), 0),
            Err(e) => log.finish_err(id.as_str(), e),
        }
        result
    }

    async fn fetch_row(&self, id: &Iri) -> Result<Option<Issuer>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let uuid = uuid::Uuid::parse_str(id.as_str()).map_err(|e| RepoError::Internal(e.to_string()))?;
                let row = sqlx::query("SELECT * FROM issuers WHERE id = $1")
                    .bind(uuid)
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(issuer_mapper::from_postgres_row).transpose()
            }
            DbBackend::Sqlite(backend) => {
                let row = sqlx::query("SELECT * FROM issuers WHERE id = ?")
                    .bind(id.as_str())
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(issuer_mapper::from_sqlite_row).transpose()
            }
        }
    }

    /// Read-merge-revalidate-bump-`updatedAt`-write. `NotFound` if the
    /// row is gone by the time of the read.
    #[instrument(level = "debug", skip(self, patch))]
    pub async fn update(&self, id: &Iri, patch: IssuerPatch) -> Result<Issuer, RepoError> {
        let log = OperationLog::start("update", ENTITY);
        let result = self.update_inner(id, patch).await;
        match &result {
            Ok(_) => log.finish_ok(id.as_str(), 1),
            Err(e) => log.finish_err(id.as_str(), e),
        }
        result
    }

    async fn update_inner(&self, id: &Iri, patch: IssuerPatch) -> Result<Issuer, RepoError> {
        let current = self.fetch_row(id).await?.ok_or_else(|| RepoError::not_found(ENTITY, id.to_string()))?;
        let updated = current.apply_patch(patch)?;
        self.write_full_row(&updated).await?;
        Ok(updated)
    }

    async fn write_full_row(&self, issuer: &Issuer) -> Result<(), RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let uuid = uuid::Uuid::parse_str(issuer.id.as_str()).map_err(|e| RepoError::Internal(e.to_string()))?;
                sqlx::query(
                    "UPDATE issuers SET name = $2, url = $3, email = $4, description = $5, image = $6, \
                     public_key = $7, additional_fields = $8, updated_at = $9 WHERE id = $1",
                )
                .bind(uuid)
                .bind(&issuer.name)
                .bind(issuer.url.as_str())
                .bind(&issuer.email)
                .bind(&issuer.description)
                .bind(issuer.image.as_ref().map(crate::convert::ImageRef::to_json).transpose()?)
                .bind(&issuer.public_key)
                .bind(serde_json::Value::Object(issuer.additional_fields.clone()))
                .bind(issuer.updated_at.as_datetime())
                .execute(&backend.pool)
                .await?;
            }
            DbBackend::Sqlite(backend) => {
                sqlx::query(
                    "UPDATE issuers SET name = ?, url = ?, email = ?, description = ?, image = ?, \
                     public_key = ?, additional_fields = ?, updated_at = ? WHERE id = ?",
                )
                .bind(json_to_text(&issuer.name))
                .bind(issuer.url.as_str())
                .bind(&issuer.email)
                .bind(&issuer.description)
                .bind(issuer.image.as_ref().map(|i| i.to_json().map(|v| json_to_text(&v))).transpose()?)
                .bind(issuer.public_key.as_ref().map(json_to_text))
                .bind(json_to_text(&serde_json::Value::Object(issuer.additional_fields.clone())))
                .bind(issuer.updated_at.to_epoch_millis())
                .bind(issuer.id.as_str())
                .execute(&backend.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Delete an issuer. Cascades to its `BadgeClass`es, `StatusList`s,
    /// and `Assertion`s via `ON DELETE CASCADE`. Returns `true` iff a
    /// row was removed.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, id: &Iri) -> Result<bool, RepoError> {
        let log = OperationLog::start("delete", ENTITY);
        let result = match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let uuid = uuid::Uuid::parse_str(id.as_str()).map_err(|e| RepoError::Internal(e.to_string()))?;
                sqlx::query("DELETE FROM issuers WHERE id = $1").bind(uuid).execute(&backend.pool).await
            }
            DbBackend::Sqlite(backend) => {
                sqlx::query("DELETE FROM issuers WHERE id = ?").bind(id.as_str()).execute(&backend.pool).await
            }
        };

        match result {
            Ok(rows) => {
                log.finish_ok(id.as_str(), rows.rows_affected());
                Ok(rows.rows_affected() > 0)
            }
            Err(e) => {
                let err = RepoError::from(e);
                log.finish_err(id.as_str(), &err);
                Err(err)
            }
        }
    }

    /// List every issuer. Permitted, but logs a warning — prefer
    /// `find_all_page`.
    pub async fn find_all(&self) -> Result<Vec<Issuer>, RepoError> {
        OperationLog::warn_unbounded(ENTITY);
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let rows = sqlx::query("SELECT * FROM issuers ORDER BY created_at").fetch_all(&backend.pool).await?;
                rows.iter().map(issuer_mapper::from_postgres_row).collect()
            }
            DbBackend::Sqlite(backend) => {
                let rows = sqlx::query("SELECT * FROM issuers ORDER BY created_at").fetch_all(&backend.pool).await?;
                rows.iter().map(issuer_mapper::from_sqlite_row).collect()
            }
        }
    }

    /// Paginated listing. Validates `pagination` before touching the
    /// backend.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_all_page(&self, pagination: Pagination) -> Result<Vec<Issuer>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let rows = sqlx::query("SELECT * FROM issuers ORDER BY created_at LIMIT $1 OFFSET $2")
                    .bind(pagination.limit)
                    .bind(pagination.offset)
                    .fetch_all(&backend.pool)
                    .await?;
                rows.iter().map(issuer_mapper::from_postgres_row).collect()
            }
            DbBackend::Sqlite(backend) => {
                let rows = sqlx::query("SELECT * FROM issuers ORDER BY created_at LIMIT ? OFFSET ?")
                    .bind(pagination.limit)
                    .bind(pagination.offset)
                    .fetch_all(&backend.pool)
                    .await?;
                rows.iter().map(issuer_mapper::from_sqlite_row).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Map};

    use super::*;
    use crate::backend::DbBackend;
    use crate::config::{DatabaseConfig, DatabaseType, SyncMode};

    async fn repo() -> IssuerRepository {
        let config = DatabaseConfig {
            db_type: DatabaseType::Sqlite,
            connection_string: None,
            sqlite_file: Some(":memory:".to_string()),
            sqlite_busy_timeout: 5_000,
            sqlite_sync_mode: SyncMode::Normal,
            sqlite_cache_size: 10_000,
            pool_max: 1,
            idle_timeout_sec: 30,
            connect_timeout_sec: 10,
            max_lifetime_sec: 3_600,
        };
        let backend = DbBackend::connect(&config).await.unwrap();
        IssuerRepository::new(Arc::new(backend))
    }

    fn new_issuer() -> NewIssuer {
        NewIssuer {
            name: json!("Acme"),
            url: Iri::new("https://acme.example").unwrap(),
            email: None,
            description: None,
            image: None,
            public_key: None,
            additional_fields: Map::new(),
        }
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let repo = repo().await;
        let created = repo.create(new_issuer()).await.unwrap();
        let found = repo.find_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn find_by_id_miss_is_none_not_error() {
        let repo = repo().await;
        assert!(repo.find_by_id(&Iri::generate()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_bumps_updated_at_and_preserves_created_at() {
        let repo = repo().await;
        let created = repo.create(new_issuer()).await.unwrap();
        let patch = IssuerPatch { name: crate::model::Patch::Set(json!("Acme Inc")), ..Default::default() };
        let updated = repo.update(&created.id, patch).await.unwrap();
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.name, json!("Acme Inc"));
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let repo = repo().await;
        let err = repo.update(&Iri::generate(), IssuerPatch::default()).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let repo = repo().await;
        let created = repo.create(new_issuer()).await.unwrap();
        assert!(repo.delete(&created.id).await.unwrap());
        assert!(!repo.delete(&created.id).await.unwrap());
    }

    #[tokio::test]
    async fn find_all_page_respects_limit_and_offset() {
        let repo = repo().await;
        for _ in 0..3 {
            repo.create(new_issuer()).await.unwrap();
        }
        let page = repo.find_all_page(Pagination::new(2, 0).unwrap()).await.unwrap();
        assert_eq!(page.len(), 2);
        let rest = repo.find_all_page(Pagination::new(2, 2).unwrap()).await.unwrap();
        assert_eq!(rest.len(), 1);
    }
}
