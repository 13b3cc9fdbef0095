use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::convert::{Iri, StatusSize, Timestamp};
use crate::error::RepoError;
use crate::model::{CredentialStatusEntry, StatusPurpose};

/// Build a `CredentialStatusEntry` from a Postgres row.
pub fn from_postgres_row(row: &PgRow) -> Result<CredentialStatusEntry, RepoError> {
    let purpose: String = row.try_get("purpose")?;
    let status_size: i16 = row.try_get("status_size")?;
    let status_list_index: i32 = row.try_get("status_list_index")?;
    let current_status: i32 = row.try_get("current_status")?;

    Ok(CredentialStatusEntry {
        id: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("id")?.to_string())?,
        credential_id: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("credential_id")?.to_string())?,
        status_list_id: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("status_list_id")?.to_string())?,
        status_list_index: u32::try_from(status_list_index)
            .map_err(|_| RepoError::Corruption(format!("negative statusListIndex: {status_list_index}")))?,
        status_size: StatusSize::try_from(i64::from(status_size))?,
        purpose: StatusPurpose::from_str(&purpose)?,
        current_status: u64::try_from(current_status)
            .map_err(|_| RepoError::Corruption(format!("negative currentStatus: {current_status}")))?,
        status_reason: row.try_get("status_reason")?,
        created_at: Timestamp::from_datetime(row.try_get("created_at")?),
        updated_at: Timestamp::from_datetime(row.try_get("updated_at")?),
    })
}

/// Build a `CredentialStatusEntry` from a SQLite row.
pub fn from_sqlite_row(row: &SqliteRow) -> Result<CredentialStatusEntry, RepoError> {
    let purpose: String = row.try_get("purpose")?;
    let status_size: i64 = row.try_get("status_size")?;
    let status_list_index: i64 = row.try_get("status_list_index")?;
    let current_status: i64 = row.try_get("current_status")?;

    Ok(CredentialStatusEntry {
        id: Iri::parse_uuid(row.try_get::<String, _>("id")?)?,
        credential_id: Iri::parse_uuid(row.try_get::<String, _>("credential_id")?)?,
        status_list_id: Iri::parse_uuid(row.try_get::<String, _>("status_list_id")?)?,
        status_list_index: u32::try_from(status_list_index)
            .map_err(|_| RepoError::Corruption(format!("invalid statusListIndex: {status_list_index}")))?,
        status_size: StatusSize::try_from(status_size)?,
        purpose: StatusPurpose::from_str(&purpose)?,
        current_status: u64::try_from(current_status)
            .map_err(|_| RepoError::Corruption(format!("invalid currentStatus: {current_status}")))?,
        status_reason: row.try_get("status_reason")?,
        created_at: Timestamp::from_epoch_millis(row.try_get("created_at")?)?,
        updated_at: Timestamp::from_epoch_millis(row.try_get("updated_at")?)?,
    })
}
