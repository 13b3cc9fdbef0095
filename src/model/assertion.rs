use serde_json::{Map, Value};

use crate::convert::{Iri, Timestamp};
use crate::error::RepoError;
use crate::model::{Patch, Recipient, Verification};

/// A single signed issuance of a `BadgeClass` to a recipient.
#[derive(Clone, Debug, PartialEq)]
pub struct Assertion {
    /// Immutable once created.
    pub id: Iri,
    /// The `BadgeClass` this asserts.
    pub badge_class: Iri,
    /// Denormalized owning issuer, for query convenience.
    pub issuer: Iri,
    /// Who earned the badge.
    pub recipient: Recipient,
    /// When the badge was issued. Must be `<= now` at creation.
    pub issued_on: Timestamp,
    /// Optional expiry. If present, must be strictly after `issuedOn`.
    pub expires: Option<Timestamp>,
    /// Supporting evidence references.
    pub evidence: Option<Vec<Value>>,
    /// Verification/proof material, stored opaquely.
    pub verification: Option<Verification>,
    /// Whether this assertion has been revoked.
    pub revoked: bool,
    /// Required whenever `revoked` is `true`.
    pub revocation_reason: Option<String>,
    /// Unrecognized keys from the caller's payload.
    pub additional_fields: Map<String, Value>,
    /// Set once at creation.
    pub created_at: Timestamp,
    /// Advances on every mutation.
    pub updated_at: Timestamp,
}

/// Fields required to create a new `Assertion`.
#[derive(Clone, Debug)]
pub struct NewAssertion {
    /// The `BadgeClass` this asserts.
    pub badge_class: Iri,
    /// Denormalized owning issuer.
    pub issuer: Iri,
    /// Who earned the badge.
    pub recipient: Recipient,
    /// When the badge was issued.
    pub issued_on: Timestamp,
    /// Optional expiry.
    pub expires: Option<Timestamp>,
    /// Supporting evidence references.
    pub evidence: Option<Vec<Value>>,
    /// Verification/proof material.
    pub verification: Option<Verification>,
    /// Unrecognized keys from the caller's payload.
    pub additional_fields: Map<String, Value>,
}

/// Partial update for `Assertion`; `id`, `badgeClass`, and `createdAt`
/// are never patchable.
#[derive(Clone, Debug, Default)]
pub struct AssertionPatch {
    /// New recipient, if changed.
    pub recipient: Patch<Recipient>,
    /// New expiry, if changed.
    pub expires: Patch<Option<Timestamp>>,
    /// New evidence list, if changed.
    pub evidence: Patch<Option<Vec<Value>>>,
    /// New verification material, if changed.
    pub verification: Patch<Option<Verification>>,
    /// New revoked flag, if changed.
    pub revoked: Patch<bool>,
    /// New revocation reason, if changed.
    pub revocation_reason: Patch<Option<String>>,
    /// New unrecognized-field map, if changed.
    pub additional_fields: Patch<Map<String, Value>>,
}

impl Assertion {
    /// Validate `issuedOn <= now`, `expires > issuedOn` if present, and
    /// `revocationReason` present whenever `revoked` is `true`.
    pub fn validate(&self) -> Result<(), RepoError> {
        if self.issued_on.as_datetime() > Timestamp::now().as_datetime() {
            return Err(RepoError::Validation("Assertion.issuedOn must not be in the future".to_string()));
        }
        if let Some(expires) = self.expires {
            if expires.as_datetime() <= self.issued_on.as_datetime() {
                return Err(RepoError::Validation("Assertion.expires must be after issuedOn".to_string()));
            }
        }
        if self.revoked && self.revocation_reason.as_deref().unwrap_or("").trim().is_empty() {
            return Err(RepoError::Validation(
                "Assertion.revocationReason is required when revoked".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply a `Patch` over this entity, bumping `updatedAt` and
    /// re-validating.
    pub fn apply_patch(mut self, patch: AssertionPatch) -> Result<Self, RepoError> {
        self.recipient = patch.recipient.apply_over(self.recipient);
        self.expires = patch.expires.apply_over(self.expires);
        self.evidence = patch.evidence.apply_over(self.evidence);
        self.verification = patch.verification.apply_over(self.verification);
        self.revoked = patch.revoked.apply_over(self.revoked);
        self.revocation_reason = patch.revocation_reason.apply_over(self.revocation_reason);
        self.additional_fields = patch.additional_fields.apply_over(self.additional_fields);
        self.updated_at = Timestamp::now();
        self.validate()?;
        Ok(self)
    }
}

impl NewAssertion {
    /// Validate and assign identity/timestamp/revocation fields. A new
    /// assertion is never created pre-revoked.
    pub fn into_entity(self) -> Result<Assertion, RepoError> {
        let now = Timestamp::now();
        let assertion = Assertion {
            id: Iri::generate(),
            badge_class: self.badge_class,
            issuer: self.issuer,
            recipient: self.recipient,
            issued_on: self.issued_on,
            expires: self.expires,
            evidence: self.evidence,
            verification: self.verification,
            revoked: false,
            revocation_reason: None,
            additional_fields: self.additional_fields,
            created_at: now,
            updated_at: now,
        };
        assertion.validate()?;
        Ok(assertion)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn sample() -> NewAssertion {
        NewAssertion {
            badge_class: Iri::generate(),
            issuer: Iri::generate(),
            recipient: Recipient::Identity {
                type_: "email".to_string(),
                identity: "a@b.test".to_string(),
                hashed: false,
                salt: None,
            },
            issued_on: Timestamp::now(),
            expires: None,
            evidence: None,
            verification: None,
            additional_fields: Map::new(),
        }
    }

    #[test]
    fn valid_assertion_constructs_unrevoked() {
        let assertion = sample().into_entity().unwrap();
        assert!(!assertion.revoked);
        assert!(assertion.revocation_reason.is_none());
    }

    #[test]
    fn future_issued_on_rejected() {
        let mut new = sample();
        new.issued_on = Timestamp::from_datetime(Timestamp::now().as_datetime() + Duration::days(1));
        assert!(new.into_entity().is_err());
    }

    #[test]
    fn expires_before_issued_on_rejected() {
        let mut new = sample();
        new.expires = Some(Timestamp::from_datetime(new.issued_on.as_datetime() - Duration::days(1)));
        assert!(new.into_entity().is_err());
    }

    #[test]
    fn revoked_without_reason_rejected_on_patch() {
        let assertion = sample().into_entity().unwrap();
        let result = assertion.apply_patch(AssertionPatch { revoked: Patch::Set(true), ..Default::default() });
        assert!(result.is_err());
    }

    #[test]
    fn revoked_with_reason_accepted_on_patch() {
        let assertion = sample().into_entity().unwrap();
        let patched = assertion
            .apply_patch(AssertionPatch {
                revoked: Patch::Set(true),
                revocation_reason: Patch::Set(Some("fraud".to_string())),
                ..Default::default()
            })
            .unwrap();
        assert!(patched.revoked);
        assert_eq!(patched.revocation_reason.as_deref(), Some("fraud"));
    }
}
