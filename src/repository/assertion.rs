use std::sync::Arc;

use tracing::instrument;

use crate::backend::DbBackend;
use crate::convert::{json_to_text, BoolFlag, Iri};
use crate::error::RepoError;
use crate::mapper::assertion as assertion_mapper;
use crate::model::{Assertion, AssertionPatch, NewAssertion};
use crate::repository::base::{OperationLog, Pagination};

const ENTITY: &str = "Assertion";

/// CRUD and listing operations over the `assertions` table.
pub struct AssertionRepository {
    backend: Arc<DbBackend>,
}

impl AssertionRepository {
    /// Build a repository over the given backend.
    #[must_use]
    pub const fn new(backend: Arc<DbBackend>) -> Self {
        Self { backend }
    }

    /// Insert a new assertion. Always created unrevoked.
    #[instrument(level = "debug", skip(self, new))]
    pub async fn create(&self, new: NewAssertion) -> Result<Assertion, RepoError> {
        let log = OperationLog::start("create", ENTITY);
        let assertion = match new.into_entity() {
            Ok(assertion) => assertion,
            Err(e) => {
                log.finish_err("<pending>", &e);
                return Err(e);
            }
        };

        let result = match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let recipient = serde_json::to_value(&assertion.recipient)
                    .map_err(|e| RepoError::Internal(format!("recipient serialization failed: {e}")))?;
                let verification = assertion
                    .verification
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()
                    .map_err(|e| RepoError::Internal(format!("verification serialization failed: {e}")))?;

                sqlx::query(
                    "INSERT INTO assertions (id, badge_class, issuer, recipient, issued_on, expires, \
                     evidence, verification, revoked, revocation_reason, additional_fields, created_at, \
                     updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
                )
                .bind(parse_uuid(&assertion.id)?)
                .bind(parse_uuid(&assertion.badge_class)?)
                .bind(parse_uuid(&assertion.issuer)?)
                .bind(recipient)
                .bind(assertion.issued_on.as_datetime())
                .bind(assertion.expires.map(|t| t.as_datetime()))
                .bind(assertion.evidence.as_ref().map(|v| serde_json::Value::Array(v.clone())))
                .bind(verification)
                .bind(BoolFlag::to_json_wrapper(assertion.revoked))
                .bind(&assertion.revocation_reason)
                .bind(serde_json::Value::Object(assertion.additional_fields.clone()))
                .bind(assertion.created_at.as_datetime())
                .bind(assertion.updated_at.as_datetime())
                .execute(&backend.pool)
                .await
            }
            DbBackend::Sqlite(backend) => {
                let recipient = serde_json::to_value(&assertion.recipient)
                    .map_err(|e| RepoError::Internal(format!("recipient serialization failed: {e}")))?;
                let verification = assertion
                    .verification
                    .as_ref()
                    .map(serde_json::to_value)
                    .transpose()
                    .map_err(|e| RepoError::Internal(format!("verification serialization failed: {e}")))?;

                sqlx::query(
                    "INSERT INTO assertions (id, badge_class, issuer, recipient, issued_on, expires, \
                     evidence, verification, revoked, revocation_reason, additional_fields, created_at, \
                     updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(assertion.id.as_str())
                .bind(assertion.badge_class.as_str())
                .bind(assertion.issuer.as_str())
                .bind(json_to_text(&recipient))
                .bind(assertion.issued_on.to_epoch_millis())
                .bind(assertion.expires.map(|t| t.to_epoch_millis()))
                .bind(assertion.evidence.as_ref().map(|v| json_to_text(&serde_json::Value::Array(v.clone()))))
                .bind(verification.as_ref().map(json_to_text))
                .bind(BoolFlag::to_int(assertion.revoked))
                .bind(&assertion.revocation_reason)
                .bind(json_to_text(&serde_json::Value::Object(assertion.additional_fields.clone())))
                .bind(assertion.created_at.to_epoch_millis())
                .bind(assertion.updated_at.to_epoch_millis())
                .execute(&backend.pool)
                .await
            }
        };

        match result {
            Ok(rows) => {
                log.finish_ok(assertion.id.as_str(), rows.rows_affected());
                Ok(assertion)
            }
            Err(e) => {
                let err = RepoError::from(e);
                log.finish_err(assertion.id.as_str(), &err);
                Err(err)
            }
        }
    }

    /// Look up an assertion by id.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_id(&self, id: &Iri) -> Result<Option<Assertion>, RepoError> {
        let log = OperationLog::start("find_by_id", ENTITY);
        let result = self.fetch_row(id).await;
        match &result {
            Ok(Some(_)) => log.finish_ok(id.as_str(), 1),
            Ok(None) => log.finish_ok(id.as_str(), 0),
            Err(e) => log.finish_err(id.as_str(), e),
        }
        result
    }

    async fn fetch_row(&self, id: &Iri) -> Result<Option<Assertion>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let row = sqlx::query("SELECT * FROM assertions WHERE id = $1")
                    .bind(parse_uuid(id)?)
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(assertion_mapper::from_postgres_row).transpose()
            }
            DbBackend::Sqlite(backend) => {
                let row = sqlx::query("SELECT * FROM assertions WHERE id = ?")
                    .bind(id.as_str())
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(assertion_mapper::from_sqlite_row).transpose()
            }
        }
    }

    /// Read-merge-revalidate-bump-`updatedAt`-write. Revoking an
    /// assertion here does not touch its `CredentialStatusEntry`; callers
    /// needing the combined operation should use the status engine.
    #[instrument(level = "debug", skip(self, patch))]
    pub async fn update(&self, id: &Iri, patch: AssertionPatch) -> Result<Assertion, RepoError> {
        let log = OperationLog::start("update", ENTITY);
        let result = self.update_inner(id, patch).await;
        match &result {
            Ok(_) => log.finish_ok(id.as_str(), 1),
            Err(e) => log.finish_err(id.as_str(), e),
        }
        result
    }

    async fn update_inner(&self, id: &Iri, patch: AssertionPatch) -> Result<Assertion, RepoError> {
        let current = self.fetch_row(id).await?.ok_or_else(|| RepoError::not_found(ENTITY, id.to_string()))?;
        let updated = current.apply_patch(patch)?;
        self.write_full_row(&updated).await?;
        Ok(updated)
    }

    async fn write_full_row(&self, assertion: &Assertion) -> Result<(), RepoError> {
        let recipient = serde_json::to_value(&assertion.recipient)
            .map_err(|e| RepoError::Internal(format!("recipient serialization failed: {e}")))?;
        let verification = assertion
            .verification
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| RepoError::Internal(format!("verification serialization failed: {e}")))?;

        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                sqlx::query(
                    "UPDATE assertions SET recipient = $2, expires = $3, evidence = $4, verification = $5, \
                     revoked = $6, revocation_reason = $7, additional_fields = $8, updated_at = $9 WHERE id = $1",
                )
                .bind(parse_uuid(&assertion.id)?)
                .bind(recipient)
                .bind(assertion.expires.map(|t| t.as_datetime()))
                .bind(assertion.evidence.as_ref().map(|v| serde_json::Value::Array(v.clone())))
                .bind(verification)
                .bind(BoolFlag::to_json_wrapper(assertion.revoked))
                .bind(&assertion.revocation_reason)
                .bind(serde_json::Value::Object(assertion.additional_fields.clone()))
                .bind(assertion.updated_at.as_datetime())
                .execute(&backend.pool)
                .await?;
            }
            DbBackend::Sqlite(backend) => {
                sqlx::query(
                    "UPDATE assertions SET recipient = ?, expires = ?, evidence = ?, verification = ?, \
                     revoked = ?, revocation_reason = ?, additional_fields = ?, updated_at = ? WHERE id = ?",
                )
                .bind(json_to_text(&recipient))
                .bind(assertion.expires.map(|t| t.to_epoch_millis()))
                .bind(assertion.evidence.as_ref().map(|v| json_to_text(&serde_json::Value::Array(v.clone()))))
                .bind(verification.as_ref().map(json_to_text))
                .bind(BoolFlag::to_int(assertion.revoked))
                .bind(&assertion.revocation_reason)
                .bind(json_to_text(&serde_json::Value::Object(assertion.additional_fields.clone())))
                .bind(assertion.updated_at.to_epoch_millis())
                .bind(assertion.id.as_str())
                .execute(&backend.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Delete an assertion. Cascades to its `CredentialStatusEntry`.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, id: &Iri) -> Result<bool, RepoError> {
        let log = OperationLog::start("delete", ENTITY);
        let result = match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                sqlx::query("DELETE FROM assertions WHERE id = $1").bind(parse_uuid(id)?).execute(&backend.pool).await
            }
            DbBackend::Sqlite(backend) => {
                sqlx::query("DELETE FROM assertions WHERE id = ?").bind(id.as_str()).execute(&backend.pool).await
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

    /// List assertions issued against a `BadgeClass`, paginated.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_badge_class(
        &self,
        badge_class: &Iri,
        pagination: Pagination,
    ) -> Result<Vec<Assertion>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let rows = sqlx::query(
                    "SELECT * FROM assertions WHERE badge_class = $1 ORDER BY created_at LIMIT $2 OFFSET $3",
                )
                .bind(parse_uuid(badge_class)?)
                .bind(pagination.limit)
                .bind(pagination.offset)
                .fetch_all(&backend.pool)
                .await?;
                rows.iter().map(assertion_mapper::from_postgres_row).collect()
            }
            DbBackend::Sqlite(backend) => {
                let rows = sqlx::query(
                    "SELECT * FROM assertions WHERE badge_class = ? ORDER BY created_at LIMIT ? OFFSET ?",
                )
                .bind(badge_class.as_str())
                .bind(pagination.limit)
                .bind(pagination.offset)
                .fetch_all(&backend.pool)
                .await?;
                rows.iter().map(assertion_mapper::from_sqlite_row).collect()
            }
        }
    }

    /// List assertions by recipient identity string, paginated. Matches
    /// the `credential_subject`/`identity` recipient index.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_recipient(
        &self,
        recipient_identity: &str,
        pagination: Pagination,
    ) -> Result<Vec<Assertion>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                // `recipient->>'id'` catches the untagged CredentialSubject
                // variant, which is stored flat (no wrapper key) — see
                // Recipient's `#[serde(untagged)]` shape in crate::model.
                let rows = sqlx::query(
                    "SELECT * FROM assertions WHERE recipient->>'identity' = $1 \
                     OR recipient->>'id' = $1 ORDER BY created_at LIMIT $2 OFFSET $3",
                )
                .bind(recipient_identity)
                .bind(pagination.limit)
                .bind(pagination.offset)
                .fetch_all(&backend.pool)
                .await?;
                rows.iter().map(assertion_mapper::from_postgres_row).collect()
            }
            DbBackend::Sqlite(backend) => {
                let rows = sqlx::query(
                    "SELECT * FROM assertions WHERE json_extract(recipient, '$.identity') = ? \
                     OR json_extract(recipient, '$.id') = ? \
                     ORDER BY created_at LIMIT ? OFFSET ?",
                )
                .bind(recipient_identity)
                .bind(recipient_identity)
                .bind(pagination.limit)
                .bind(pagination.offset)
                .fetch_all(&backend.pool)
                .await?;
                rows.iter().map(assertion_mapper::from_sqlite_row).collect()
            }
        }
    }
}

fn parse_uuid(id: &Iri) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(id.as_str()).map_err(|e| RepoError::Internal(e.to_string()))
}
