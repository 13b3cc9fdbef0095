use serde_json::Value;

use crate::error::RepoError;

/// Boolean persistence divergence between backends: the Postgres/JSONB
/// backend wraps the flag in a `{"status": bool}` object so the column
/// stays JSONB end to end; the SQLite backend stores a plain `0`/`1`
/// integer. The domain entity always sees a plain `bool`; only the
/// mapper layer touches `BoolFlag`.
pub struct BoolFlag;

impl BoolFlag {
    /// Build the JSON wrapper used by the JSONB backend.
    #[must_use]
    pub fn to_json_wrapper(value: bool) -> Value {
        serde_json::json!({ "status": value })
    }

    /// Read the JSON wrapper back into a `bool`. A wrapper missing the
    /// `status` key, or whose value isn't a JSON boolean, is corruption.
    pub fn from_json_wrapper(value: &Value) -> Result<bool, RepoError> {
        value
            .get("status")
            .and_then(Value::as_bool)
            .ok_or_else(|| RepoError::Corruption(format!("malformed boolean wrapper: {value}")))
    }

    /// Convert to the SQLite `0`/`1` integer representation.
    #[must_use]
    pub const fn to_int(value: bool) -> i64 {
        if value { 1 } else { 0 }
    }

    /// Read the SQLite integer representation back into a `bool`. Any
    /// value other than `0` or `1` is corruption, never silently
    /// truthy-coerced.
    pub fn from_int(value: i64) -> Result<bool, RepoError> {
        match value {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(RepoError::Corruption(format!("invalid boolean integer: {other}"))),
        }
    }
}
