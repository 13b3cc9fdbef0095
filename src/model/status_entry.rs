use crate::convert::{Iri, StatusSize, Timestamp};
use crate::error::RepoError;
use crate::model::StatusPurpose;

/// Binding between one `Assertion` and one slot in one `StatusList`. At
/// most one entry per `(credentialId, purpose)`.
#[derive(Clone, Debug, PartialEq)]
pub struct CredentialStatusEntry {
    /// Immutable once created.
    pub id: Iri,
    /// The `Assertion` this entry tracks status for.
    pub credential_id: Iri,
    /// The `StatusList` owning the claimed slot.
    pub status_list_id: Iri,
    /// Index of the claimed slot within the `StatusList`. Unique within
    /// `statusListId`.
    pub status_list_index: u32,
    /// Must equal the owning `StatusList`'s `statusSize`.
    pub status_size: StatusSize,
    /// Must equal the owning `StatusList`'s `purpose`.
    pub purpose: StatusPurpose,
    /// Current status value, `0 <= x <= 2^statusSize - 1`.
    pub current_status: u64,
    /// Human-readable reason for the current status.
    pub status_reason: Option<String>,
    /// Set once at creation.
    pub created_at: Timestamp,
    /// Advances on every status mutation.
    pub updated_at: Timestamp,
}

impl CredentialStatusEntry {
    /// Validate `currentStatus` is in range for `statusSize`.
    pub fn validate_range(&self) -> Result<(), RepoError> {
        if self.current_status > self.status_size.max_value() {
            return Err(RepoError::Validation(format!(
                "currentStatus {} exceeds max value {} for statusSize {}",
                self.current_status,
                self.status_size.max_value(),
                self.status_size.bits()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(status_size: StatusSize, current_status: u64) -> CredentialStatusEntry {
        let now = Timestamp::now();
        CredentialStatusEntry {
            id: Iri::generate(),
            credential_id: Iri::generate(),
            status_list_id: Iri::generate(),
            status_list_index: 0,
            status_size,
            purpose: StatusPurpose::Revocation,
            current_status,
            status_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn in_range_status_is_valid() {
        assert!(sample(StatusSize::new(2).unwrap(), 3).validate_range().is_ok());
    }

    #[test]
    fn out_of_range_status_is_invalid() {
        assert!(sample(StatusSize::new(2).unwrap(), 4).validate_range().is_err());
    }
}
