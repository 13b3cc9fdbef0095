use std::fmt;
use std::time::Instant;

use crate::error::RepoError;

/// `limit`/`offset` bounds for paginated finders: `limit` in `(0, 1000]`,
/// `offset >= 0`. Validated at entry before the backend is touched,
/// matching the testable property that pagination failures never reach
/// the database.
#[derive(Clone, Copy, Debug)]
pub struct Pagination {
    /// Maximum rows to return.
    pub limit: i64,
    /// Rows to skip before the first returned row.
    pub offset: i64,
}

impl Pagination {
    /// Validate and construct a `Pagination`.
    pub fn new(limit: i64, offset: i64) -> Result<Self, RepoError> {
        if limit <= 0 || limit > 1000 {
            return Err(RepoError::Validation(format!("limit must be in (0, 1000], got {limit}")));
        }
        if offset < 0 {
            return Err(RepoError::Validation(format!("offset must be >= 0, got {offset}")));
        }
        Ok(Self { limit, offset })
    }
}

/// Wraps a value whose `Debug`/tracing representation should be
/// redacted by the log sink rather than printed in full — password
/// hashes, raw signing keys, full write payloads.
pub struct Sensitive<T>(pub T);

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Records operation name, entity type, entity id, row count, and
/// duration for a repository method via `tracing::debug!`, paired with
/// `#[instrument(level = "debug", skip(self, ...))]` on the method itself.
pub struct OperationLog {
    operation: &'static str,
    entity: &'static str,
    started_at: Instant,
}

impl OperationLog {
    /// Begin timing `operation` against `entity`.
    #[must_use]
    pub fn start(operation: &'static str, entity: &'static str) -> Self {
        Self { operation, entity, started_at: Instant::now() }
    }

    /// Log a successful outcome with the affected entity id and row
    /// count.
    pub fn finish_ok(self, entity_id: &str, rows: u64) {
        tracing::debug!(
            operation = self.operation,
            entity = self.entity,
            entity_id,
            rows,
            duration_ms = self.started_at.elapsed().as_millis() as u64,
            "repository operation succeeded"
        );
    }

    /// Log a failed outcome.
    pub fn finish_err(self, entity_id: &str, err: &RepoError) {
        tracing::warn!(
            operation = self.operation,
            entity = self.entity,
            entity_id,
            duration_ms = self.started_at.elapsed().as_millis() as u64,
            error = %err,
            "repository operation failed"
        );
    }

    /// Log that an unbounded listing method was invoked.
    pub fn warn_unbounded(entity: &'static str) {
        tracing::warn!(entity, "unbounded find_all invoked; prefer a paginated finder");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_accepts_boundary_values() {
        assert!(Pagination::new(1, 0).is_ok());
        assert!(Pagination::new(1000, 0).is_ok());
    }

    #[test]
    fn pagination_rejects_out_of_range_limit() {
        assert!(Pagination::new(0, 0).is_err());
        assert!(Pagination::new(-1, 0).is_err());
        assert!(Pagination::new(1001, 0).is_err());
    }

    #[test]
    fn pagination_rejects_negative_offset() {
        assert!(Pagination::new(10, -1).is_err());
    }

    #[test]
    fn sensitive_debug_redacts() {
        let wrapped = Sensitive("super-secret-key");
        assert_eq!(format!("{wrapped:?}"), "<redacted>");
    }
}
