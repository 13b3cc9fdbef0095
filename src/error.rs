//! # Repository Errors
//!
//! Typed error categories surfaced by the persistence, cache, and
//! status-list layers. Repository methods classify driver- and
//! validation-level failures into one of these variants rather than
//! leaking a backend-specific exception shape.

use thiserror::Error;

/// Error categories returned by repositories, mappers, and the status-list
/// engine.
#[derive(Error, Debug)]
pub enum RepoError {
    /// The caller supplied a malformed entity or out-of-range argument
    /// (missing required field, invalid IRI, status out of range for
    /// `statusSize`, pagination out of range).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An update or delete targeted a row that no longer exists. Plain
    /// lookups (`find_by_id`) signal a miss with `Ok(None)`, never this
    /// variant.
    #[error("not found: {entity} {id}")]
    NotFound {
        /// Entity type name, e.g. `"Issuer"`.
        entity: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// A unique-constraint violation, most importantly a
    /// `(statusListId, statusListIndex)` collision or a
    /// `(credentialId, purpose)` duplication. Callers may retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Decoded bitstring length mismatch, unparseable JSON in a required
    /// column, or an invalid boolean integer read back from storage.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Connection lost, timeout, or pool exhausted. Not recovered locally.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A mapper precondition was violated, e.g. a record missing a
    /// required foreign key.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RepoError {
    /// Shorthand for a `NotFound` error against a given entity/id pair.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(db_err.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                Self::BackendUnavailable(err.to_string())
            }
            sqlx::Error::RowNotFound => Self::Internal("unexpected missing row".to_string()),
            _ => Self::Internal(err.to_string()),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RepoError>;

/// The one structured-result type in this crate: `updateCredentialStatus`
/// reports failure as data rather than propagating an error, so callers
/// inspecting a status mutation never need to distinguish "it threw" from
/// "it failed".
#[derive(Debug, Clone)]
pub struct StatusUpdateResult {
    /// Whether the mutation committed.
    pub success: bool,
    /// Populated when `success` is `false`.
    pub error: Option<String>,
}

impl StatusUpdateResult {
    /// Build a successful result.
    #[must_use]
    pub const fn ok() -> Self {
        Self { success: true, error: None }
    }

    /// Build a failed result from an error, stringifying it for the
    /// caller-facing payload.
    #[must_use]
    pub fn failed(err: &RepoError) -> Self {
        Self { success: false, error: Some(err.to_string()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_entity_and_id() {
        let err = RepoError::not_found("Issuer", "abc-123");
        assert_eq!(err.to_string(), "not found: Issuer abc-123");
    }

    #[test]
    fn status_update_result_failed_stringifies_error() {
        let err = RepoError::Conflict("duplicate slot".to_string());
        let result = StatusUpdateResult::failed(&err);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("conflict: duplicate slot"));
    }
}
