use std::sync::Arc;

use sqlx::Row;
use tracing::instrument;

use crate::backend::{DbBackend, DbTx};
use crate::convert::{json_to_text, Iri, StatusSize, Timestamp};
use crate::error::{RepoError, StatusUpdateResult};
use crate::mapper::{status_entry as status_entry_mapper, status_list as status_list_mapper};
use crate::model::{CredentialStatusEntry, StatusList, StatusPurpose, MIN_TOTAL_ENTRIES};
use crate::repository::base::OperationLog;
use crate::status::codec;

const LIST_ENTITY: &str = "StatusList";
const ENTRY_ENTITY: &str = "CredentialStatusEntry";

/// Point-in-time statistics for a `StatusList`: the stored `totalEntries`
/// / `usedEntries` counters alongside a verified `COUNT(*)` of its
/// `CredentialStatusEntry` rows, matching the invariant that the
/// stored counter and the row count agree.
#[derive(Clone, Copy, Debug)]
pub struct StatusListStats {
    /// Capacity of the list.
    pub total_entries: u32,
    /// The list's own `usedEntries` counter.
    pub used_entries: u32,
    /// `COUNT(*)` of entries actually referencing this list.
    pub counted_entries: u32,
}

/// Allocation, mutation, and lookup over `status_lists` and
/// `credential_status_entries`. Unlike the CRUD repositories, every
/// write here is a multi-step read-modify-write transaction, so this is
/// its own module rather than a thin wrapper over `RepoBase`.
///
/// `findCredentialsNeedingStatus` is intentionally not implemented here:
/// there is no concrete definition of which credentials "need" a status
/// refresh to build against.
pub struct StatusListRepository {
    backend: Arc<DbBackend>,
}

impl StatusListRepository {
    /// Build a repository over the given backend.
    #[must_use]
    pub const fn new(backend: Arc<DbBackend>) -> Self {
        Self { backend }
    }

    /// The oldest `StatusList` for `(issuer_id, purpose, status_size)`
    /// with spare capacity, ordered by `usedEntries ASC` (tightest-pack
    /// policy). `None` if every matching list is full or none exists.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_available_status_list(
        &self,
        issuer_id: &Iri,
        purpose: StatusPurpose,
        status_size: StatusSize,
    ) -> Result<Option<StatusList>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let row = sqlx::query(
                    "SELECT * FROM status_lists WHERE issuer_id = $1 AND purpose = $2 AND status_size = $3 \
                     AND used_entries < total_entries ORDER BY used_entries ASC LIMIT 1",
                )
                .bind(parse_uuid(issuer_id)?)
                .bind(purpose.to_string())
                .bind(i16::from(status_size.bits()))
                .fetch_optional(&backend.pool)
                .await?;
                row.as_ref().map(status_list_mapper::from_postgres_row).transpose()
            }
            DbBackend::Sqlite(backend) => {
                let row = sqlx::query(
                    "SELECT * FROM status_lists WHERE issuer_id = ? AND purpose = ? AND status_size = ? \
                     AND used_entries < total_entries ORDER BY used_entries ASC LIMIT 1",
                )
                .bind(issuer_id.as_str())
                .bind(purpose.to_string())
                .bind(i64::from(status_size.bits()))
                .fetch_optional(&backend.pool)
                .await?;
                row.as_ref().map(status_list_mapper::from_sqlite_row).transpose()
            }
        }
    }

    /// `allocateStatusPosition` plus the slot-claiming
    /// `CredentialStatusEntry` insert, run as one transaction. Keeping
    /// the increment and the claim in the same transaction is what the
    /// spec's correctness argument requires — splitting them across two
    /// transactions reopens the race it describes. The unique index on
    /// `(statusListId, statusListIndex)` remains the backstop if that
    /// invariant is ever violated by a future caller.
    #[instrument(level = "debug", skip(self))]
    pub async fn allocate_status_position(
        &self,
        issuer_id: &Iri,
        credential_id: &Iri,
        purpose: StatusPurpose,
        status_size: StatusSize,
    ) -> Result<CredentialStatusEntry, RepoError> {
        let log = OperationLog::start("allocate_status_position", ENTRY_ENTITY);
        let result = self.allocate_inner(issuer_id, credential_id, purpose, status_size).await;
        match &result {
            Ok(entry) => log.finish_ok(entry.id.as_str(), 1),
            Err(e) => log.finish_err(credential_id.as_str(), e),
        }
        result
    }

    async fn allocate_inner(
        &self,
        issuer_id: &Iri,
        credential_id: &Iri,
        purpose: StatusPurpose,
        status_size: StatusSize,
    ) -> Result<CredentialStatusEntry, RepoError> {
        let mut tx = self.backend.begin().await?;

        let list = match Self::select_available_locked(&mut tx, issuer_id, purpose, status_size).await? {
            Some(list) => list,
            None => Self::insert_new_list(&mut tx, issuer_id, purpose, status_size).await?,
        };

        let index = list.used_entries;
        Self::increment_used_entries(&mut tx, &list.id).await?;

        let now = Timestamp::now();
        let entry = CredentialStatusEntry {
            id: Iri::generate(),
            credential_id: credential_id.clone(),
            status_list_id: list.id.clone(),
            status_list_index: index,
            status_size,
            purpose,
            current_status: 0,
            status_reason: None,
            created_at: now,
            updated_at: now,
        };
        entry.validate_range()?;
        Self::insert_entry(&mut tx, &entry).await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn select_available_locked(
        tx: &mut DbTx<'_>,
        issuer_id: &Iri,
        purpose: StatusPurpose,
        status_size: StatusSize,
    ) -> Result<Option<StatusList>, RepoError> {
        match tx {
            DbTx::Postgres(t) => {
                let row = sqlx::query(
                    "SELECT * FROM status_lists WHERE issuer_id = $1 AND purpose = $2 AND status_size = $3 \
                     AND used_entries < total_entries ORDER BY used_entries ASC LIMIT 1 FOR UPDATE",
                )
                .bind(parse_uuid(issuer_id)?)
                .bind(purpose.to_string())
                .bind(i16::from(status_size.bits()))
                .fetch_optional(&mut *t)
                .await?;
                row.as_ref().map(status_list_mapper::from_postgres_row).transpose()
            }
            DbTx::Sqlite(t) => {
                let row = sqlx::query(
                    "SELECT * FROM status_lists WHERE issuer_id = ? AND purpose = ? AND status_size = ? \
                     AND used_entries < total_entries ORDER BY used_entries ASC LIMIT 1",
                )
                .bind(issuer_id.as_str())
                .bind(purpose.to_string())
                .bind(i64::from(status_size.bits()))
                .fetch_optional(&mut *t)
                .await?;
                row.as_ref().map(status_list_mapper::from_sqlite_row).transpose()
            }
        }
    }

    async fn insert_new_list(
        tx: &mut DbTx<'_>,
        issuer_id: &Iri,
        purpose: StatusPurpose,
        status_size: StatusSize,
    ) -> Result<StatusList, RepoError> {
        let now = Timestamp::now();
        let bytes = codec::zeroes(MIN_TOTAL_ENTRIES, status_size);
        let list = StatusList {
            id: Iri::generate(),
            issuer_id: issuer_id.clone(),
            purpose,
            status_size,
            encoded_list: codec::encode(&bytes)?,
            ttl: None,
            total_entries: MIN_TOTAL_ENTRIES,
            used_entries: 0,
            metadata: None,
            created_at: now,
            updated_at: now,
        };
        list.validate_capacity()?;

        match tx {
            DbTx::Postgres(t) => {
                sqlx::query(
                    "INSERT INTO status_lists (id, issuer_id, purpose, status_size, encoded_list, ttl, \
                     total_entries, used_entries, metadata, created_at, updated_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
                )
                .bind(parse_uuid(&list.id)?)
                .bind(parse_uuid(&list.issuer_id)?)
                .bind(list.purpose.to_string())
                .bind(i16::from(list.status_size.bits()))
                .bind(&list.encoded_list)
                .bind(list.ttl.map(|v| v as i64))
                .bind(list.total_entries as i32)
                .bind(list.used_entries as i32)
                .bind(&list.metadata)
                .bind(list.created_at.as_datetime())
                .bind(list.updated_at.as_datetime())
                .execute(&mut *t)
                .await?;
            }
            DbTx::Sqlite(t) => {
                sqlx::query(
                    "INSERT INTO status_lists (id, issuer_id, purpose, status_size, encoded_list, ttl, \
                     total_entries, used_entries, metadata, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(list.id.as_str())
                .bind(list.issuer_id.as_str())
                .bind(list.purpose.to_string())
                .bind(i64::from(list.status_size.bits()))
                .bind(&list.encoded_list)
                .bind(list.ttl.map(|v| v as i64))
                .bind(i64::from(list.total_entries))
                .bind(i64::from(list.used_entries))
                .bind(list.metadata.as_ref().map(json_to_text))
                .bind(list.created_at.to_epoch_millis())
                .bind(list.updated_at.to_epoch_millis())
                .execute(&mut *t)
                .await?;
            }
        }
        Ok(list)
    }

    async fn increment_used_entries(tx: &mut DbTx<'_>, list_id: &Iri) -> Result<(), RepoError> {
        let now = Timestamp::now();
        match tx {
            DbTx::Postgres(t) => {
                sqlx::query("UPDATE status_lists SET used_entries = used_entries + 1, updated_at = $2 WHERE id = $1")
                    .bind(parse_uuid(list_id)?)
                    .bind(now.as_datetime())
                    .execute(&mut *t)
                    .await?;
            }
            DbTx::Sqlite(t) => {
                sqlx::query("UPDATE status_lists SET used_entries = used_entries + 1, updated_at = ? WHERE id = ?")
                    .bind(now.to_epoch_millis())
                    .bind(list_id.as_str())
                    .execute(&mut *t)
                    .await?;
            }
        }
        Ok(())
    }

    async fn insert_entry(tx: &mut DbTx<'_>, entry: &CredentialStatusEntry) -> Result<(), RepoError> {
        match tx {
            DbTx::Postgres(t) => {
                sqlx::query(
                    "INSERT INTO credential_status_entries (id, credential_id, status_list_id, \
                     status_list_index, status_size, purpose, current_status, status_reason, created_at, \
                     updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
                )
                .bind(parse_uuid(&entry.id)?)
                .bind(parse_uuid(&entry.credential_id)?)
                .bind(parse_uuid(&entry.status_list_id)?)
                .bind(entry.status_list_index as i32)
                .bind(i16::from(entry.status_size.bits()))
                .bind(entry.purpose.to_string())
                .bind(entry.current_status as i32)
                .bind(&entry.status_reason)
                .bind(entry.created_at.as_datetime())
                .bind(entry.updated_at.as_datetime())
                .execute(&mut *t)
                .await?;
            }
            DbTx::Sqlite(t) => {
                sqlx::query(
                    "INSERT INTO credential_status_entries (id, credential_id, status_list_id, \
                     status_list_index, status_size, purpose, current_status, status_reason, created_at, \
                     updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(entry.id.as_str())
                .bind(entry.credential_id.as_str())
                .bind(entry.status_list_id.as_str())
                .bind(i64::from(entry.status_list_index))
                .bind(i64::from(entry.status_size.bits()))
                .bind(entry.purpose.to_string())
                .bind(entry.current_status as i64)
                .bind(&entry.status_reason)
                .bind(entry.created_at.to_epoch_millis())
                .bind(entry.updated_at.to_epoch_millis())
                .execute(&mut *t)
                .await?;
            }
        }
        Ok(())
    }

    /// `updateCredentialStatus`: read-modify-write the owning
    /// list's bitstring and the entry's `currentStatus` inside one
    /// transaction. Reports failure as the one structured-result type
    /// rather than propagating an error, so a caller mutating a
    /// credential's status never needs to distinguish "it threw" from
    /// "it failed".
    #[instrument(level = "debug", skip(self, reason))]
    pub async fn update_credential_status(
        &self,
        credential_id: &Iri,
        purpose: StatusPurpose,
        status: u64,
        reason: Option<String>,
    ) -> StatusUpdateResult {
        let log = OperationLog::start("update_credential_status", ENTRY_ENTITY);
        match self.update_credential_status_inner(credential_id, purpose, status, reason).await {
            Ok(()) => {
                log.finish_ok(credential_id.as_str(), 1);
                StatusUpdateResult::ok()
            }
            Err(e) => {
                log.finish_err(credential_id.as_str(), &e);
                StatusUpdateResult::failed(&e)
            }
        }
    }

    async fn update_credential_status_inner(
        &self,
        credential_id: &Iri,
        purpose: StatusPurpose,
        status: u64,
        reason: Option<String>,
    ) -> Result<(), RepoError> {
        let mut tx = self.backend.begin().await?;

        let entry = Self::select_entry_locked(&mut tx, credential_id, purpose)
            .await?
            .ok_or_else(|| RepoError::not_found(ENTRY_ENTITY, format!("{credential_id}/{purpose}")))?;

        let list = Self::select_list_locked(&mut tx, &entry.status_list_id)
            .await?
            .ok_or_else(|| RepoError::not_found(LIST_ENTITY, entry.status_list_id.to_string()))?;

        if status > entry.status_size.max_value() {
            return Err(RepoError::Validation(format!(
                "status {status} exceeds max value {} for statusSize {}",
                entry.status_size.max_value(),
                entry.status_size.bits()
            )));
        }

        let expected_len = StatusList::expected_byte_length(list.total_entries, list.status_size);
        let mut bytes = codec::decode(&list.encoded_list, expected_len)?;
        codec::write_bits(&mut bytes, entry.status_list_index, entry.status_size, status)?;
        let encoded_list = codec::encode(&bytes)?;

        let now = Timestamp::now();
        Self::write_list_encoding(&mut tx, &list.id, &encoded_list, now).await?;
        Self::write_entry_status(&mut tx, &entry.id, status, reason.as_deref(), now).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn select_entry_locked(
        tx: &mut DbTx<'_>,
        credential_id: &Iri,
        purpose: StatusPurpose,
    ) -> Result<Option<CredentialStatusEntry>, RepoError> {
        match tx {
            DbTx::Postgres(t) => {
                let row = sqlx::query(
                    "SELECT * FROM credential_status_entries WHERE credential_id = $1 AND purpose = $2 FOR UPDATE",
                )
                .bind(parse_uuid(credential_id)?)
                .bind(purpose.to_string())
                .fetch_optional(&mut *t)
                .await?;
                row.as_ref().map(status_entry_mapper::from_postgres_row).transpose()
            }
            DbTx::Sqlite(t) => {
                let row = sqlx::query("SELECT * FROM credential_status_entries WHERE credential_id = ? AND purpose = ?")
                    .bind(credential_id.as_str())
                    .bind(purpose.to_string())
                    .fetch_optional(&mut *t)
                    .await?;
                row.as_ref().map(status_entry_mapper::from_sqlite_row).transpose()
            }
        }
    }

    async fn select_list_locked(tx: &mut DbTx<'_>, list_id: &Iri) -> Result<Option<StatusList>, RepoError> {
        match tx {
            DbTx::Postgres(t) => {
                let row = sqlx::query("SELECT * FROM status_lists WHERE id = $1 FOR UPDATE")
                    .bind(parse_uuid(list_id)?)
                    .fetch_optional(&mut *t)
                    .await?;
                row.as_ref().map(status_list_mapper::from_postgres_row).transpose()
            }
            DbTx::Sqlite(t) => {
                let row = sqlx::query("SELECT * FROM status_lists WHERE id = ?")
                    .bind(list_id.as_str())
                    .fetch_optional(&mut *t)
                    .await?;
                row.as_ref().map(status_list_mapper::from_sqlite_row).transpose()
            }
        }
    }

    async fn write_list_encoding(
        tx: &mut DbTx<'_>,
        list_id: &Iri,
        encoded_list: &str,
        now: Timestamp,
    ) -> Result<(), RepoError> {
        match tx {
            DbTx::Postgres(t) => {
                sqlx::query("UPDATE status_lists SET encoded_list = $2, updated_at = $3 WHERE id = $1")
                    .bind(parse_uuid(list_id)?)
                    .bind(encoded_list)
                    .bind(now.as_datetime())
                    .execute(&mut *t)
                    .await?;
            }
            DbTx::Sqlite(t) => {
                sqlx::query("UPDATE status_lists SET encoded_list = ?, updated_at = ? WHERE id = ?")
                    .bind(encoded_list)
                    .bind(now.to_epoch_millis())
                    .bind(list_id.as_str())
                    .execute(&mut *t)
                    .await?;
            }
        }
        Ok(())
    }

    async fn write_entry_status(
        tx: &mut DbTx<'_>,
        entry_id: &Iri,
        status: u64,
        reason: Option<&str>,
        now: Timestamp,
    ) -> Result<(), RepoError> {
        match tx {
            DbTx::Postgres(t) => {
                sqlx::query(
                    "UPDATE credential_status_entries SET current_status = $2, status_reason = $3, \
                     updated_at = $4 WHERE id = $1",
                )
                .bind(parse_uuid(entry_id)?)
                .bind(status as i32)
                .bind(reason)
                .bind(now.as_datetime())
                .execute(&mut *t)
                .await?;
            }
            DbTx::Sqlite(t) => {
                sqlx::query(
                    "UPDATE credential_status_entries SET current_status = ?, status_reason = ?, \
                     updated_at = ? WHERE id = ?",
                )
                .bind(status as i64)
                .bind(reason)
                .bind(now.to_epoch_millis())
                .bind(entry_id.as_str())
                .execute(&mut *t)
                .await?;
            }
        }
        Ok(())
    }

    /// `getStatus`: decode the owning list's bitstring and read the
    /// `statusSize`-wide value at the entry's index. Callers interpret
    /// the integer per `purpose` (e.g. for `revocation`, `0` = valid,
    /// `1` = revoked).
    #[instrument(level = "debug", skip(self))]
    pub async fn get_status(&self, credential_id: &Iri, purpose: StatusPurpose) -> Result<u64, RepoError> {
        let entry = self
            .find_status_entry(credential_id, purpose)
            .await?
            .ok_or_else(|| RepoError::not_found(ENTRY_ENTITY, format!("{credential_id}/{purpose}")))?;
        let list = self
            .fetch_list(&entry.status_list_id)
            .await?
            .ok_or_else(|| RepoError::not_found(LIST_ENTITY, entry.status_list_id.to_string()))?;

        let expected_len = StatusList::expected_byte_length(list.total_entries, list.status_size);
        let bytes = codec::decode(&list.encoded_list, expected_len)?;
        codec::read_bits(&bytes, entry.status_list_index, entry.status_size)
    }

    /// Look up the `CredentialStatusEntry` for `(credential_id,
    /// purpose)`. A miss is `Ok(None)`, never an error.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_status_entry(
        &self,
        credential_id: &Iri,
        purpose: StatusPurpose,
    ) -> Result<Option<CredentialStatusEntry>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let row = sqlx::query("SELECT * FROM credential_status_entries WHERE credential_id = $1 AND purpose = $2")
                    .bind(parse_uuid(credential_id)?)
                    .bind(purpose.to_string())
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(status_entry_mapper::from_postgres_row).transpose()
            }
            DbBackend::Sqlite(backend) => {
                let row = sqlx::query("SELECT * FROM credential_status_entries WHERE credential_id = ? AND purpose = ?")
                    .bind(credential_id.as_str())
                    .bind(purpose.to_string())
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(status_entry_mapper::from_sqlite_row).transpose()
            }
        }
    }

    async fn fetch_list(&self, list_id: &Iri) -> Result<Option<StatusList>, RepoError> {
        match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                let row = sqlx::query("SELECT * FROM status_lists WHERE id = $1")
                    .bind(parse_uuid(list_id)?)
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(status_list_mapper::from_postgres_row).transpose()
            }
            DbBackend::Sqlite(backend) => {
                let row = sqlx::query("SELECT * FROM status_lists WHERE id = ?")
                    .bind(list_id.as_str())
                    .fetch_optional(&backend.pool)
                    .await?;
                row.as_ref().map(status_list_mapper::from_sqlite_row).transpose()
            }
        }
    }

    /// Stored counters for a `StatusList` alongside a verified
    /// `COUNT(*)` of its entries.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_status_list_stats(&self, status_list_id: &Iri) -> Result<StatusListStats, RepoError> {
        let list = self
            .fetch_list(status_list_id)
            .await?
            .ok_or_else(|| RepoError::not_found(LIST_ENTITY, status_list_id.to_string()))?;

        let counted_entries: i64 = match self.backend.as_ref() {
            DbBackend::Postgres(backend) => {
                sqlx::query("SELECT COUNT(*) AS n FROM credential_status_entries WHERE status_list_id = $1")
                    .bind(parse_uuid(status_list_id)?)
                    .fetch_one(&backend.pool)
                    .await?
                    .try_get("n")?
            }
            DbBackend::Sqlite(backend) => {
                sqlx::query("SELECT COUNT(*) AS n FROM credential_status_entries WHERE status_list_id = ?")
                    .bind(status_list_id.as_str())
                    .fetch_one(&backend.pool)
                    .await?
                    .try_get("n")?
            }
        };

        Ok(StatusListStats {
            total_entries: list.total_entries,
            used_entries: list.used_entries,
            counted_entries: u32::try_from(counted_entries)
                .map_err(|_| RepoError::Corruption(format!("negative entry count: {counted_entries}")))?,
        })
    }
}

fn parse_uuid(id: &Iri) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(id.as_str()).map_err(|e| RepoError::Internal(e.to_string()))
}
