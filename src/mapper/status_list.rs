use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::convert::{json_from_text, Iri, StatusSize, Timestamp};
use crate::error::RepoError;
use crate::model::{StatusList, StatusPurpose};

/// Build a `StatusList` from a Postgres row.
pub fn from_postgres_row(row: &PgRow) -> Result<StatusList, RepoError> {
    let purpose: String = row.try_get("purpose")?;
    let status_size: i16 = row.try_get("status_size")?;
    let ttl: Option<i64> = row.try_get("ttl")?;
    let total_entries: i32 = row.try_get("total_entries")?;
    let used_entries: i32 = row.try_get("used_entries")?;

    Ok(StatusList {
        id: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("id")?.to_string())?,
        issuer_id: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("issuer_id")?.to_string())?,
        purpose: StatusPurpose::from_str(&purpose)?,
        status_size: StatusSize::try_from(i64::from(status_size))?,
        encoded_list: row.try_get("encoded_list")?,
        ttl: ttl.map(|v| u64::try_from(v).unwrap_or(0)),
        total_entries: u32::try_from(total_entries)
            .map_err(|_| RepoError::Corruption(format!("negative totalEntries: {total_entries}")))?,
        used_entries: u32::try_from(used_entries)
            .map_err(|_| RepoError::Corruption(format!("negative usedEntries: {used_entries}")))?,
        metadata: row.try_get("metadata")?,
        created_at: Timestamp::from_datetime(row.try_get("created_at")?),
        updated_at: Timestamp::from_datetime(row.try_get("updated_at")?),
    })
}

/// Build a `StatusList` from a SQLite row. `status_size` is accepted as
/// either a native integer or text-of-number for backward compatibility.
pub fn from_sqlite_row(row: &SqliteRow) -> Result<StatusList, RepoError> {
    let purpose: String = row.try_get("purpose")?;
    let status_size = parse_status_size(row)?;
    let ttl: Option<i64> = row.try_get("ttl")?;
    let total_entries: i64 = row.try_get("total_entries")?;
    let used_entries: i64 = row.try_get("used_entries")?;
    let metadata_text: Option<String> = row.try_get("metadata")?;

    Ok(StatusList {
        id: Iri::parse_uuid(row.try_get::<String, _>("id")?)?,
        issuer_id: Iri::parse_uuid(row.try_get::<String, _>("issuer_id")?)?,
        purpose: StatusPurpose::from_str(&purpose)?,
        status_size,
        encoded_list: row.try_get("encoded_list")?,
        ttl: ttl.map(|v| u64::try_from(v).unwrap_or(0)),
        total_entries: u32::try_from(total_entries)
            .map_err(|_| RepoError::Corruption(format!("invalid totalEntries: {total_entries}")))?,
        used_entries: u32::try_from(used_entries)
            .map_err(|_| RepoError::Corruption(format!("invalid usedEntries: {used_entries}")))?,
        metadata: metadata_text.map(|t| json_from_text(Some(&t))).transpose()?,
        created_at: Timestamp::from_epoch_millis(row.try_get("created_at")?)?,
        updated_at: Timestamp::from_epoch_millis(row.try_get("updated_at")?)?,
    })
}

/// `status_size` is declared `INTEGER` in this crate's own schema, but
/// older rows written by a prior source variant may carry it as
/// text-of-number. Try the native integer decode first and only fall
/// back to text on failure, rather than always paying the string-parse
/// cost.
fn parse_status_size(row: &SqliteRow) -> Result<StatusSize, RepoError> {
    if let Ok(n) = row.try_get::<i64, _>("status_size") {
        return StatusSize::try_from(n);
    }
    let text: String = row.try_get("status_size")?;
    StatusSize::from_text(&text)
}
