use std::collections::HashSet;
use std::sync::Arc;

use tracing::instrument;

use crate::backend::DbBackend;
use crate::convert::{json_to_text, Iri};
use crate::error::RepoError;
use crate::mapper::badge_class as badge_class_mapper;
use crate::model::{BadgeClass, BadgeClassPatch, NewBadgeClass};
use crate::repository::base::{OperationLog, Pagination};

const ENTITY: &str = "BadgeClass";

/// Maximum hops walked while validating a `previousVersion` chain before
/// it's treated as a cycle.
const MAX_CHAIN_DEPTH: usize = 1000;

/// CRUD and listing operations over the `badge_classes` table.
pub struct BadgeClassRepository {
    backend: Arc<DbBackend>,
}

impl BadgeClassRepository {
    /// Build a repository over the given backend.
    #[must_use]
    pub const fn new(backend: Arc<DbBackend>) -> Self {
        Self { backend }
    }

    /// Insert a new badge class. Validates the `previousVersion` chain
    /// before writing.
    #[instrument(level = "debug", skip(self, new))]
    pub async fn create(&self, new: NewBadgeClass) -> Result<BadgeClass, RepoError> {
        let log = OperationLog::start("create", ENTITY);
        let badge_class = match new.into_entity() {
            Ok(badge_class) => badge_class,
            Err(e) => {
                log.finish_err("<pending>", &e);
                return Err(e);
            }
        };

        if let Err(e) = self.validate_version_chain(&badge_class).await {
            log.finish_err(badge_class.id.as_str(), &e);
            return Err(e);
        }

        let result = match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                sqlx::query(
                    "INSERT INTO badge_classes (id, issuer, name, description, image, criteria, alignment, \
                     tags, version, previous_version, related, endorsement, additional_fields, created_at, \
                     updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
                )
                .bind(parse_uuid(&badge_class.id)?)
                .bind(parse_uuid(&badge_class.issuer)?)
                .bind(&badge_class.name)
                .bind(&badge_class.description)
                .bind(badge_class.image.to_json()?)
                .bind(&badge_class.criteria)
                .bind(badge_class.alignment.as_ref().map(|v| serde_json::Value::Array(v.clone())))
                .bind(badge_class.tags.as_ref().map(|v| serde_json::to_value(v).unwrap_or_default()))
                .bind(&badge_class.version)
                .bind(badge_class.previous_version.as_ref().map(parse_uuid).transpose()?)
                .bind(&badge_class.related)
                .bind(&badge_class.endorsement)
                .bind(serde_json::Value::Object(badge_class.additional_fields.clone()))
                .bind(badge_class.created_at.as_datetime())
                .bind(badge_class.updated_at.as_datetime())
                .execute(&backend.pool)
                .await
            }
            DbBackend::Sqlite(backend) => {
                sqlx::query(
                    "INSERT INTO badge_classes (id, issuer, name, description, image, criteria, alignment, \
                     tags, version, previous_version, related, endorsement, additional_fields, created_at, \
                     updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(badge_class.id.as_str())
                .bind(badge_class.issuer.as_str())
                .bind(json_to_text(&badge_class.name))
                .bind(&badge_class.description)
                .bind(json_to_text(&badge_class.image.to_json()?))
                .bind(json_to_text(&badge_class.criteria))
                .bind(
                    badge_class
                        .alignment
                        .as_ref()
                        .map(|v| json_to_text(&serde_json::Value::Array(v.clone()))),
                )
                .bind(badge_class.tags.as_ref().map(|v| json_to_text(&serde_json::to_value(v).unwrap_or_default())))
                .bind(&badge_class.version)
                .bind(badge_class.previous_version.as_ref().map(Iri::as_str))
                .bind(badge_class.related.as_ref().map(json_to_text))
                .bind(badge_class.endorsement.as_ref().map(json_to_text))
                .bind(json_to_text(&serde_json::Value::Object(badge_class.additional_fields.clone())))
                .bind(badge_class.created_at.to_epoch_millis())
                .bind(badge_class.updated_at.to_epoch_millis())
                .execute(&backend.pool)
                .await
            }
        };

        match result {
            Ok(rows) => {
                log.finish_ok(badge_class.id.as_str(), rows.rows_affected());
                Ok(badge_class)
            }
            Err(e) => {
                let err = RepoError::from(e);
                log.finish_err(badge_class.id.as_str(), &err);
                Err(err)
            }
        }
    }

    /// Look up a badge class by id.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_id(&self, id: &Iri) -> Result<Option<BadgeClass>, RepoError> {
        let log = OperationLog::start("find_by_id", ENTITY);
        let result = self.fetch_row(id).await;
        match &result {
            Ok(Some(_)) => log.finish_ok(id.as_str(), 1),
            Ok(None) => log.finish_ok(id.as_str(), 0),
            Err(e) => log.finish_err(id.as_str(), e),
        }
        result
    }

    async fn fetch_row(&self, id: &Iri) -> Result<Option<BadgeClass>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let row = sqlx::query("SELECT * FROM badge_classes WHERE id = $1")
                    .bind(parse_uuid(id)?)
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(badge_class_mapper::from_postgres_row).transpose()
            }
            DbBackend::Sqlite(backend) => {
                let row = sqlx::query("SELECT * FROM badge_classes WHERE id = ?")
                    .bind(id.as_str())
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(badge_class_mapper::from_sqlite_row).transpose()
            }
        }
    }

    /// Read-merge-revalidate-bump-`updatedAt`-write.
    #[instrument(level = "debug", skip(self, patch))]
    pub async fn update(&self, id: &Iri, patch: BadgeClassPatch) -> Result<BadgeClass, RepoError> {
        let log = OperationLog::start("update", ENTITY);
        let result = self.update_inner(id, patch).await;
        match &result {
            Ok(_) => log.finish_ok(id.as_str(), 1),
            Err(e) => log.finish_err(id.as_str(), e),
        }
        result
    }

    async fn update_inner(&self, id: &Iri, patch: BadgeClassPatch) -> Result<BadgeClass, RepoError> {
        let current = self.fetch_row(id).await?.ok_or_else(|| RepoError::not_found(ENTITY, id.to_string()))?;
        let previous_version_changed = matches!(&patch.previous_version, crate::model::Patch::Set(_));
        let updated = current.apply_patch(patch)?;
        if previous_version_changed {
            self.validate_version_chain(&updated).await?;
        }
        self.write_full_row(&updated).await?;
        Ok(updated)
    }

    async fn write_full_row(&self, badge_class: &BadgeClass) -> Result<(), RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                sqlx::query(
                    "UPDATE badge_classes SET name = $2, description = $3, image = $4, criteria = $5, \
                     alignment = $6, tags = $7, version = $8, previous_version = $9, related = $10, \
                     endorsement = $11, additional_fields = $12, updated_at = $13 WHERE id = $1",
                )
                .bind(parse_uuid(&badge_class.id)?)
                .bind(&badge_class.name)
                .bind(&badge_class.description)
                .bind(badge_class.image.to_json()?)
                .bind(&badge_class.criteria)
                .bind(badge_class.alignment.as_ref().map(|v| serde_json::Value::Array(v.clone())))
                .bind(badge_class.tags.as_ref().map(|v| serde_json::to_value(v).unwrap_or_default()))
                .bind(&badge_class.version)
                .bind(badge_class.previous_version.as_ref().map(parse_uuid).transpose()?)
                .bind(&badge_class.related)
                .bind(&badge_class.endorsement)
                .bind(serde_json::Value::Object(badge_class.additional_fields.clone()))
                .bind(badge_class.updated_at.as_datetime())
                .execute(&backend.pool)
                .await?;
            }
            DbBackend::Sqlite(backend) => {
                sqlx::query(
                    "UPDATE badge_classes SET name = ?, description = ?, image = ?, criteria = ?, \
                     alignment = ?, tags = ?, version = ?, previous_version = ?, related = ?, \
                     endorsement = ?, additional_fields = ?, updated_at = ? WHERE id = ?",
                )
                .bind(json_to_text(&badge_class.name))
                .bind(&badge_class.description)
                .bind(json_to_text(&badge_class.image.to_json()?))
                .bind(json_to_text(&badge_class.criteria))
                .bind(
                    badge_class
                        .alignment
                        .as_ref()
                        .map(|v| json_to_text(&serde_json::Value::Array(v.clone()))),
                )
                .bind(badge_class.tags.as_ref().map(|v| json_to_text(&serde_json::to_value(v).unwrap_or_default())))
                .bind(&badge_class.version)
                .bind(badge_class.previous_version.as_ref().map(Iri::as_str))
                .bind(badge_class.related.as_ref().map(json_to_text))
                .bind(badge_class.endorsement.as_ref().map(json_to_text))
                .bind(json_to_text(&serde_json::Value::Object(badge_class.additional_fields.clone())))
                .bind(badge_class.updated_at.to_epoch_millis())
                .bind(badge_class.id.as_str())
                .execute(&backend.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Delete a badge class. Cascades to its `Assertion`s.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, id: &Iri) -> Result<bool, RepoError> {
        let log = OperationLog::start("delete", ENTITY);
        let result = match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                sqlx::query("DELETE FROM badge_classes WHERE id = $1").bind(parse_uuid(id)?).execute(&backend.pool).await
            }
            DbBackend::Sqlite(backend) => {
                sqlx::query("DELETE FROM badge_classes WHERE id = ?").bind(id.as_str()).execute(&backend.pool).await
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

    /// List badge classes belonging to an issuer, paginated.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_issuer(&self, issuer: &Iri, pagination: Pagination) -> Result<Vec<BadgeClass>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let rows = sqlx::query(
                    "SELECT * FROM badge_classes WHERE issuer = $1 ORDER BY created_at LIMIT $2 OFFSET $3",
                )
                .bind(parse_uuid(issuer)?)
                .bind(pagination.limit)
                .bind(pagination.offset)
                .fetch_all(&backend.pool)
                .await?;
                rows.iter().map(badge_class_mapper::from_postgres_row).collect()
            }
            DbBackend::Sqlite(backend) => {
                let rows = sqlx::query(
                    "SELECT * FROM badge_classes WHERE issuer = ? ORDER BY created_at LIMIT ? OFFSET ?",
                )
                .bind(issuer.as_str())
                .bind(pagination.limit)
                .bind(pagination.offset)
                .fetch_all(&backend.pool)
                .await?;
                rows.iter().map(badge_class_mapper::from_sqlite_row).collect()
            }
        }
    }

    /// Walk the `previousVersion` chain starting at `badge_class`,
    /// returning it oldest-first. Used by callers that need the full
    /// lineage rather than just validating it.
    pub async fn find_version_chain(&self, badge_class: &BadgeClass) -> Result<Vec<BadgeClass>, RepoError> {
        let mut chain = vec![badge_class.clone()];
        let mut cursor = badge_class.previous_version.clone();
        let mut seen = HashSet::new();
        seen.insert(badge_class.id.to_string());

        while let Some(prev_id) = cursor {
            if !seen.insert(prev_id.to_string()) {
                return Err(RepoError::Corruption(format!(
                    "cyclic previousVersion chain detected at {prev_id}"
                )));
            }
            if chain.len() > MAX_CHAIN_DEPTH {
                return Err(RepoError::Corruption("previousVersion chain exceeds maximum depth".to_string()));
            }
            let prev = self
                .fetch_row(&prev_id)
                .await?
                .ok_or_else(|| RepoError::Validation(format!("previousVersion {prev_id} does not exist")))?;
            cursor = prev.previous_version.clone();
            chain.push(prev);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Enforce that `badge_class.previousVersion`, if set, references an
    /// existing `BadgeClass` under the same issuer, and that following it
    /// does not cycle back to `badge_class` itself.
    pub async fn validate_version_chain(&self, badge_class: &BadgeClass) -> Result<(), RepoError> {
        let Some(prev_id) = badge_class.previous_version.clone() else {
            return Ok(());
        };

        let prev = self
            .fetch_row(&prev_id)
            .await?
            .ok_or_else(|| RepoError::Validation(format!("previousVersion {prev_id} does not exist")))?;

        if prev.issuer != badge_class.issuer {
            return Err(RepoError::Validation(
                "previousVersion must belong to the same issuer".to_string(),
            ));
        }

        self.find_version_chain(&prev).await?;
        Ok(())
    }
}

fn parse_uuid(id: &Iri) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(id.as_str()).map_err(|e| RepoError::Internal(e.to_string()))
}
