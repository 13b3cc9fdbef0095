use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::convert::{json_from_text, ImageRef, Iri, Timestamp};
use crate::error::RepoError;
use crate::mapper::issuer::object_or_empty;
use crate::model::BadgeClass;

/// Build a `BadgeClass` from a Postgres row.
pub fn from_postgres_row(row: &PgRow) -> Result<BadgeClass, RepoError> {
    let image: serde_json::Value = row.try_get("image")?;
    let alignment: Option<serde_json::Value> = row.try_get("alignment")?;
    let tags: Option<serde_json::Value> = row.try_get("tags")?;
    let previous_version: Option<uuid::Uuid> = row.try_get("previous_version")?;
    let additional_fields: serde_json::Value = row.try_get("additional_fields")?;

    Ok(BadgeClass {
        id: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("id")?.to_string())?,
        issuer: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("issuer")?.to_string())?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        image: ImageRef::from_json(&image)?,
        criteria: row.try_get("criteria")?,
        alignment: alignment.map(parse_array).transpose()?,
        tags: tags.map(parse_string_array).transpose()?,
        version: row.try_get("version")?,
        previous_version: previous_version.map(|u| Iri::parse_uuid(u.to_string())).transpose()?,
        related: row.try_get("related")?,
        endorsement: row.try_get("endorsement")?,
        additional_fields: object_or_empty(additional_fields)?,
        created_at: Timestamp::from_datetime(row.try_get("created_at")?),
        updated_at: Timestamp::from_datetime(row.try_get("updated_at")?),
    })
}

/// Build a `BadgeClass` from a SQLite row.
pub fn from_sqlite_row(row: &SqliteRow) -> Result<BadgeClass, RepoError> {
    let name_text: String = row.try_get("name")?;
    let image_text: String = row.try_get("image")?;
    let criteria_text: String = row.try_get("criteria")?;
    let alignment_text: Option<String> = row.try_get("alignment")?;
    let tags_text: Option<String> = row.try_get("tags")?;
    let previous_version: Option<String> = row.try_get("previous_version")?;
    let related_text: Option<String> = row.try_get("related")?;
    let endorsement_text: Option<String> = row.try_get("endorsement")?;
    let additional_fields_text: String = row.try_get("additional_fields")?;

    Ok(BadgeClass {
        id: Iri::parse_uuid(row.try_get::<String, _>("id")?)?,
        issuer: Iri::parse_uuid(row.try_get::<String, _>("issuer")?)?,
        name: json_from_text(Some(&name_text))?,
        description: row.try_get("description")?,
        image: ImageRef::from_json(&json_from_text(Some(&image_text))?)?,
        criteria: json_from_text(Some(&criteria_text))?,
        alignment: alignment_text.map(|t| json_from_text(Some(&t)).and_then(parse_array)).transpose()?,
        tags: tags_text.map(|t| json_from_text(Some(&t)).and_then(parse_string_array)).transpose()?,
        version: row.try_get("version")?,
        previous_version: previous_version.map(Iri::parse_uuid).transpose()?,
        related: related_text.map(|t| json_from_text(Some(&t))).transpose()?,
        endorsement: endorsement_text.map(|t| json_from_text(Some(&t))).transpose()?,
        additional_fields: object_or_empty(json_from_text(Some(&additional_fields_text))?)?,
        created_at: Timestamp::from_epoch_millis(row.try_get("created_at")?)?,
        updated_at: Timestamp::from_epoch_millis(row.try_get("updated_at")?)?,
    })
}

fn parse_array(value: serde_json::Value) -> Result<Vec<serde_json::Value>, RepoError> {
    match value {
        serde_json::Value::Array(items) => Ok(items),
        other => Err(RepoError::Corruption(format!("expected a JSON array, got {other}"))),
    }
}

fn parse_string_array(value: serde_json::Value) -> Result<Vec<String>, RepoError> {
    parse_array(value)?
        .into_iter()
        .map(|item| match item {
            serde_json::Value::String(s) => Ok(s),
            other => Err(RepoError::Corruption(format!("expected a string tag, got {other}"))),
        })
        .collect()
}
