use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::convert::{json_from_text, ImageRef, Iri, Timestamp};
use crate::error::RepoError;
use crate::model::Issuer;

/// Build an `Issuer` from a Postgres row (native UUID/JSONB columns).
pub fn from_postgres_row(row: &PgRow) -> Result<Issuer, RepoError> {
    let image: Option<serde_json::Value> = row.try_get("image")?;
    let public_key: Option<serde_json::Value> = row.try_get("public_key")?;
    let additional_fields: serde_json::Value = row.try_get("additional_fields")?;

    Ok(Issuer {
        id: Iri::parse_uuid(row.try_get::<uuid::Uuid, _>("id")?.to_string())?,
        name: row.try_get("name")?,
        url: Iri::new(row.try_get::<String, _>("url")?)?,
        email: row.try_get("email")?,
        description: row.try_get("description")?,
        image: image.map(|v| ImageRef::from_json(&v)).transpose()?,
        public_key,
        additional_fields: object_or_empty(additional_fields)?,
        created_at: Timestamp::from_datetime(row.try_get("created_at")?),
        updated_at: Timestamp::from_datetime(row.try_get("updated_at")?),
    })
}

/// Build an `Issuer` from a SQLite row (text/epoch-integer columns).
pub fn from_sqlite_row(row: &SqliteRow) -> Result<Issuer, RepoError> {
    let name_text: String = row.try_get("name")?;
    let image_text: Option<String> = row.try_get("image")?;
    let public_key_text: Option<String> = row.try_get("public_key")?;
    let additional_fields_text: String = row.try_get("additional_fields")?;

    let image = match image_text {
        Some(text) => Some(ImageRef::from_json(&json_from_text(Some(&text))?)?),
        None => None,
    };
    let public_key = match public_key_text {
        Some(text) => Some(json_from_text(Some(&text))?),
        None => None,
    };

    Ok(Issuer {
        id: Iri::parse_uuid(row.try_get::<String, _>("id")?)?,
        name: json_from_text(Some(&name_text))?,
        url: Iri::new(row.try_get::<String, _>("url")?)?,
        email: row.try_get("email")?,
        description: row.try_get("description")?,
        image,
        public_key,
        additional_fields: object_or_empty(json_from_text(Some(&additional_fields_text))?)?,
        created_at: Timestamp::from_epoch_millis(row.try_get("created_at")?)?,
        updated_at: Timestamp::from_epoch_millis(row.try_get("updated_at")?)?,
    })
}

pub(crate) fn object_or_empty(
    value: serde_json::Value,
) -> Result<serde_json::Map<String, serde_json::Value>, RepoError> {
    match value {
        serde_json::Value::Object(map) => Ok(map),
        serde_json::Value::Null => Ok(serde_json::Map::new()),
        other => Err(RepoError::Corruption(format!("additionalFields must be an object, got {other}"))),
    }
}
