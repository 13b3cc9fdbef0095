use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::convert::{json_from_text, BoolFlag, Iri, Timestamp};
use crate::error::RepoError;
use crate::mapper::issuer::object_or_empty;
use crate::model::{Assertion, Recipient, Verification};

fn parse_recipient(value: serde_json::Value) -> Result<Recipient, RepoError> {
    serde_json::from_value(value).map_err(|e| RepoError::Corruption(format!("invalid recipient: {e}")))
}

fn parse_verification(value: serde_json::Value) -> Result<Verification, RepoError> {
    serde_json::from_value(value).map_err(|e| RepoError::Corruption(format!("invalid verification: {e}")))
}

fn parse_evidence(value: serde_json::Value) -> Result<Vec<serde_json::Value>, RepoError> {
    match value {
        serde_json::Value::Array(items) => Ok(items),
        other => Err(RepoError::Corruption(format!("expected a JSON array for evidence, got {other}"))),
    }
}

/// Build an `Assertion` from a Postgres row. `revoked` is stored as the
/// `{"status": bool}` JSON wrapper on this backend.
pub fn from_postgres_row(row: &PgRow) -> Result<Assertion, RepoError> {
    let recipient: serde_json::Value = row.try_get("recipient")?;
    let evidence: Option<serde_json::Value> = row.try_get("evidence")?;
    let verification: Option<serde_json::Value> = row.try_get("verification")?;
    let revoked: serde_json::Value = row.try_get("revoked")?;
    let additional_fields: serde_json::Value = row.try_get("additional_fields")?;

    Ok(Assertion {
        id: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("id")?.to_string())?,
        badge_class: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("badge_class")?.to_string())?,
        issuer: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("issuer")?.to_string())?,
        recipient: parse_recipient(recipient)?,
        issued_on: Timestamp::from_datetime(row.try_get("issued_on")?),
        expires: row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>("expires")?.map(Timestamp::from_datetime),
        evidence: evidence.map(parse_evidence).transpose()?,
        verification: verification.map(parse_verification).transpose()?,
        revoked: BoolFlag::from_json_wrapper(&revoked)?,
        revocation_reason: row.try_get("revocation_reason")?,
        additional_fields: object_or_empty(additional_fields)?,
        created_at: Timestamp::from_datetime(row.try_get("created_at")?),
        updated_at: Timestamp::from_datetime(row.try_get("updated_at")?),
    })
}

/// Build an `Assertion` from a SQLite row. `revoked` is a `0`/`1`
/// integer on this backend.
pub fn from_sqlite_row(row: &SqliteRow) -> Result<Assertion, RepoError> {
    let recipient_text: String = row.try_get("recipient")?;
    let evidence_text: Option<String> = row.try_get("evidence")?;
    let verification_text: Option<String> = row.try_get("verification")?;
    let additional_fields_text: String = row.try_get("additional_fields")?;
    let expires_millis: Option<i64> = row.try_get("expires")?;

    Ok(Assertion {
        id: Iri::parse_uuid(row.try_get::<String, _>("id")?)?,
        badge_class: Iri::parse_uuid(row.try_get::<String, _>("badge_class")?)?,
        issuer: Iri::parse_uuid(row.try_get::<String, _>("issuer")?)?,
        recipient: parse_recipient(json_from_text(Some(&recipient_text))?)?,
        issued_on: Timestamp::from_epoch_millis(row.try_get("issued_on")?)?,
        expires: expires_millis.map(Timestamp::from_epoch_millis).transpose()?,
        evidence: evidence_text.map(|t| json_from_text(Some(&t)).and_then(parse_evidence)).transpose()?,
        verification: verification_text.map(|t| json_from_text(Some(&t)).and_then(parse_verification)).transpose()?,
        revoked: BoolFlag::from_int(row.try_get("revoked")?)?,
        revocation_reason: row.try_get("revocation_reason")?,
        additional_fields: object_or_empty(json_from_text(Some(&additional_fields_text))?)?,
        created_at: Timestamp::from_epoch_millis(row.try_get("created_at")?)?,
        updated_at: Timestamp::from_epoch_millis(row.try_get("updated_at")?)?,
    })
}
