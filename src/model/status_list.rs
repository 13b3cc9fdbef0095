use serde_json::Value;

use crate::convert::{Iri, StatusSize, Timestamp};
use crate::error::RepoError;
use crate::model::StatusPurpose;

/// Minimum capacity for a freshly-allocated status list, per the
/// Bitstring Status List specification (16KB of uncompressed bitstring
/// at `statusSize = 1`).
pub const MIN_TOTAL_ENTRIES: u32 = 131_072;

/// The shared revocation/suspension/refresh/message bitstring for one
/// `(issuer, purpose, statusSize)` combination.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusList {
    /// Immutable once created.
    pub id: Iri,
    /// Owning issuer.
    pub issuer_id: Iri,
    /// What the bits in this list mean.
    pub purpose: StatusPurpose,
    /// Bits per entry.
    pub status_size: StatusSize,
    /// `base64url(GZIP(bitstring bytes))`, no padding.
    pub encoded_list: String,
    /// Time-to-live in milliseconds for cached copies of the published
    /// status list credential.
    pub ttl: Option<u64>,
    /// Total number of slots this list can hold.
    pub total_entries: u32,
    /// Number of slots claimed so far. Monotonically non-decreasing
    /// under normal operation.
    pub used_entries: u32,
    /// Arbitrary metadata.
    pub metadata: Option<Value>,
    /// Set once at creation.
    pub created_at: Timestamp,
    /// Advances on every mutation.
    pub updated_at: Timestamp,
}

impl StatusList {
    /// The exact decoded byte length this list's bitstring must have:
    /// `ceil(totalEntries * statusSize / 8)`.
    #[must_use]
    pub const fn expected_byte_length(total_entries: u32, status_size: StatusSize) -> usize {
        let total_bits = total_entries as usize * status_size.bits() as usize;
        total_bits.div_ceil(8)
    }

    /// Validate capacity invariants: `usedEntries <= totalEntries`, and
    /// `totalEntries` at least [`MIN_TOTAL_ENTRIES`].
    pub fn validate_capacity(&self) -> Result<(), RepoError> {
        if self.total_entries < MIN_TOTAL_ENTRIES {
            return Err(RepoError::Validation(format!(
                "StatusList.totalEntries must be at least {MIN_TOTAL_ENTRIES}, got {}",
                self.total_entries
            )));
        }
        if self.used_entries > self.total_entries {
            return Err(RepoError::Validation(format!(
                "StatusList.usedEntries ({}) exceeds totalEntries ({})",
                self.used_entries, self.total_entries
            )));
        }
        Ok(())
    }

    /// `true` if this list has at least one free slot.
    #[must_use]
    pub const fn has_capacity(&self) -> bool {
        self.used_entries < self.total_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_byte_length_rounds_up_to_whole_bytes() {
        assert_eq!(StatusList::expected_byte_length(131_072, StatusSize::new(1).unwrap()), 16_384);
        assert_eq!(StatusList::expected_byte_length(131_072, StatusSize::new(2).unwrap()), 32_768);
    }

    #[test]
    fn used_entries_exceeding_total_is_invalid() {
        let now = Timestamp::now();
        let list = StatusList {
            id: Iri::generate(),
            issuer_id: Iri::generate(),
            purpose: StatusPurpose::Revocation,
            status_size: StatusSize::new(1).unwrap(),
            encoded_list: String::new(),
            ttl: None,
            total_entries: MIN_TOTAL_ENTRIES,
            used_entries: MIN_TOTAL_ENTRIES + 1,
            metadata: None,
            created_at: now,
            updated_at: now,
        };
        assert!(list.validate_capacity().is_err());
    }
}
