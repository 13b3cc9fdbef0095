use serde_json::{Map, Value};

use crate::convert::{ImageRef, Iri, Timestamp};
use crate::error::RepoError;
use crate::model::Patch;

/// A signing authority. Owns its `BadgeClass`es, `StatusList`s, and
/// `Assertion`s; deletion cascades to all three.
#[derive(Clone, Debug, PartialEq)]
pub struct Issuer {
    /// Immutable once created.
    pub id: Iri,
    /// Display name; may be a language map, stored opaquely as JSON.
    pub name: Value,
    /// The issuer's homepage.
    pub url: Iri,
    /// Contact email, if published.
    pub email: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Logo/image, either a bare IRI or a structured image object.
    pub image: Option<ImageRef>,
    /// Opaque public key material, consumed by the external signing
    /// collaborator.
    pub public_key: Option<Value>,
    /// Unrecognized keys from the caller's payload, preserved for
    /// round-trip.
    pub additional_fields: Map<String, Value>,
    /// Set once at creation, never changes.
    pub created_at: Timestamp,
    /// Advances on every mutation.
    pub updated_at: Timestamp,
}

/// Fields required to create a new `Issuer`. `id`, `createdAt`, and
/// `updatedAt` are assigned by the repository, not the caller.
#[derive(Clone, Debug, Default)]
pub struct NewIssuer {
    /// Display name.
    pub name: Value,
    /// Homepage IRI.
    pub url: Iri,
    /// Contact email.
    pub email: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Logo/image.
    pub image: Option<ImageRef>,
    /// Opaque public key material.
    pub public_key: Option<Value>,
    /// Unrecognized keys from the caller's payload.
    pub additional_fields: Map<String, Value>,
}

/// Partial update for `Issuer`; `id` and `createdAt` are never patchable.
#[derive(Clone, Debug, Default)]
pub struct IssuerPatch {
    /// New display name, if changed.
    pub name: Patch<Value>,
    /// New homepage IRI, if changed.
    pub url: Patch<Iri>,
    /// New contact email, if changed.
    pub email: Patch<Option<String>>,
    /// New description, if changed.
    pub description: Patch<Option<String>>,
    /// New logo/image, if changed.
    pub image: Patch<Option<ImageRef>>,
    /// New public key material, if changed.
    pub public_key: Patch<Option<Value>>,
    /// New unrecognized-field map, if changed.
    pub additional_fields: Patch<Map<String, Value>>,
}

impl Issuer {
    /// Validate the invariants a fresh or freshly-patched `Issuer` must
    /// satisfy: `name` and `url` present and non-empty.
    pub fn validate(&self) -> Result<(), RepoError> {
        if self.name.is_null() || (self.name.is_string() && self.name.as_str() == Some("")) {
            return Err(RepoError::Validation("Issuer.name is required".to_string()));
        }
        if self.url.as_str().trim().is_empty() {
            return Err(RepoError::Validation("Issuer.url is required".to_string()));
        }
        Ok(())
    }

    /// Apply a `Patch` over this entity, bumping `updatedAt` and
    /// re-validating. `id` and `createdAt` are untouched.
    pub fn apply_patch(mut self, patch: IssuerPatch) -> Result<Self, RepoError> {
        self.name = patch.name.apply_over(self.name);
        self.url = patch.url.apply_over(self.url);
        self.email = patch.email.apply_over(self.email);
        self.description = patch.description.apply_over(self.description);
        self.image = patch.image.apply_over(self.image);
        self.public_key = patch.public_key.apply_over(self.public_key);
        self.additional_fields = patch.additional_fields.apply_over(self.additional_fields);
        self.updated_at = Timestamp::now();
        self.validate()?;
        Ok(self)
    }
}

impl NewIssuer {
    /// Validate and assign identity/timestamp fields, producing a
    /// persistable `Issuer`.
    pub fn into_entity(self) -> Result<Issuer, RepoError> {
        let now = Timestamp::now();
        let issuer = Issuer {
            id: Iri::generate(),
            name: self.name,
            url: self.url,
            email: self.email,
            description: self.description,
            image: self.image,
            public_key: self.public_key,
            additional_fields: self.additional_fields,
            created_at: now,
            updated_at: now,
        };
        issuer.validate()?;
        Ok(issuer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewIssuer {
        NewIssuer {
            name: Value::String("Acme".to_string()),
            url: Iri::new("https://acme.example").unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn new_issuer_generates_uuid_id_and_equal_timestamps() {
        let issuer = sample().into_entity().unwrap();
        assert_eq!(issuer.created_at, issuer.updated_at);
        assert!(uuid::Uuid::parse_str(issuer.id.as_str()).is_ok());
    }

    #[test]
    fn missing_name_fails_validation() {
        let mut new = sample();
        new.name = Value::Null;
        assert!(new.into_entity().is_err());
    }

    #[test]
    fn patch_preserves_id_and_created_at_and_bumps_updated_at() {
        let issuer = sample().into_entity().unwrap();
        let original_id = issuer.id.clone();
        let original_created = issuer.created_at;

        std::thread::sleep(std::time::Duration::from_millis(2));
        let patched = issuer
            .apply_patch(IssuerPatch { name: Patch::Set(Value::String("New".to_string())), ..Default::default() })
            .unwrap();

        assert_eq!(patched.id, original_id);
        assert_eq!(patched.created_at, original_created);
        assert!(patched.updated_at > original_created);
        assert_eq!(patched.name, Value::String("New".to_string()));
    }
}
