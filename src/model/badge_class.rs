use serde_json::{Map, Value};

use crate::convert::{ImageRef, Iri, Timestamp};
use crate::error::RepoError;
use crate::model::Patch;

/// The template of an award: what was achieved, and under what criteria.
#[derive(Clone, Debug, PartialEq)]
pub struct BadgeClass {
    /// Immutable once created.
    pub id: Iri,
    /// Owning issuer.
    pub issuer: Iri,
    /// Display name.
    pub name: Value,
    /// Description of the achievement.
    pub description: String,
    /// Badge artwork.
    pub image: ImageRef,
    /// Criteria for earning the badge. Defaults to `{}`.
    pub criteria: Value,
    /// Alignment to external frameworks/standards.
    pub alignment: Option<Vec<Value>>,
    /// Free-text tags.
    pub tags: Option<Vec<String>>,
    /// Caller-assigned version label.
    pub version: Option<String>,
    /// Forms a single-parent version chain with another `BadgeClass`
    /// under the same issuer; `None` for the root of a chain.
    pub previous_version: Option<Iri>,
    /// Related badge references.
    pub related: Option<Value>,
    /// Endorsement claims.
    pub endorsement: Option<Value>,
    /// Unrecognized keys from the caller's payload.
    pub additional_fields: Map<String, Value>,
    /// Set once at creation.
    pub created_at: Timestamp,
    /// Advances on every mutation.
    pub updated_at: Timestamp,
}

/// Fields required to create a new `BadgeClass`.
#[derive(Clone, Debug)]
pub struct NewBadgeClass {
    /// Owning issuer.
    pub issuer: Iri,
    /// Display name.
    pub name: Value,
    /// Description of the achievement.
    pub description: String,
    /// Badge artwork.
    pub image: ImageRef,
    /// Criteria for earning the badge.
    pub criteria: Value,
    /// Alignment to external frameworks/standards.
    pub alignment: Option<Vec<Value>>,
    /// Free-text tags.
    pub tags: Option<Vec<String>>,
    /// Caller-assigned version label.
    pub version: Option<String>,
    /// A prior `BadgeClass` this version supersedes.
    pub previous_version: Option<Iri>,
    /// Related badge references.
    pub related: Option<Value>,
    /// Endorsement claims.
    pub endorsement: Option<Value>,
    /// Unrecognized keys from the caller's payload.
    pub additional_fields: Map<String, Value>,
}

/// Partial update for `BadgeClass`; `id`, `issuer`, and `createdAt` are
/// never patchable (reassigning `issuer` would break the ownership
/// invariant `previousVersion` depends on).
#[derive(Clone, Debug, Default)]
pub struct BadgeClassPatch {
    /// New display name, if changed.
    pub name: Patch<Value>,
    /// New description, if changed.
    pub description: Patch<String>,
    /// New artwork, if changed.
    pub image: Patch<ImageRef>,
    /// New criteria, if changed.
    pub criteria: Patch<Value>,
    /// New alignment list, if changed.
    pub alignment: Patch<Option<Vec<Value>>>,
    /// New tag list, if changed.
    pub tags: Patch<Option<Vec<String>>>,
    /// New version label, if changed.
    pub version: Patch<Option<String>>,
    /// New previous-version reference, if changed.
    pub previous_version: Patch<Option<Iri>>,
    /// New related list, if changed.
    pub related: Patch<Option<Value>>,
    /// New endorsement claims, if changed.
    pub endorsement: Patch<Option<Value>>,
    /// New unrecognized-field map, if changed.
    pub additional_fields: Patch<Map<String, Value>>,
}

impl BadgeClass {
    /// Structural invariants checkable without consulting other rows:
    /// `name`/`description` present, `criteria` is an object.
    ///
    /// The cross-entity invariant — `previousVersion` must reference an
    /// existing `BadgeClass` under the *same* issuer, and the chain must
    /// be acyclic — cannot be checked here; it is enforced by
    /// `BadgeClassRepository::validate_version_chain`, which has access
    /// to the other rows.
    pub fn validate(&self) -> Result<(), RepoError> {
        if self.name.is_null() {
            return Err(RepoError::Validation("BadgeClass.name is required".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(RepoError::Validation("BadgeClass.description is required".to_string()));
        }
        if !self.criteria.is_object() {
            return Err(RepoError::Validation("BadgeClass.criteria must be an object".to_string()));
        }
        Ok(())
    }

    /// Apply a `Patch` over this entity, bumping `updatedAt` and
    /// re-validating the structural invariants.
    pub fn apply_patch(mut self, patch: BadgeClassPatch) -> Result<Self, RepoError> {
        self.name = patch.name.apply_over(self.name);
        self.description = patch.description.apply_over(self.description);
        self.image = patch.image.apply_over(self.image);
        self.criteria = patch.criteria.apply_over(self.criteria);
        self.alignment = patch.alignment.apply_over(self.alignment);
        self.tags = patch.tags.apply_over(self.tags);
        self.version = patch.version.apply_over(self.version);
        self.previous_version = patch.previous_version.apply_over(self.previous_version);
        self.related = patch.related.apply_over(self.related);
        self.endorsement = patch.endorsement.apply_over(self.endorsement);
        self.additional_fields = patch.additional_fields.apply_over(self.additional_fields);
        self.updated_at = Timestamp::now();
        self.validate()?;
        Ok(self)
    }
}

impl NewBadgeClass {
    /// Validate and assign identity/timestamp fields. Does not check the
    /// cross-entity version-chain invariant; callers must follow with
    /// `BadgeClassRepository::validate_version_chain` before persisting.
    pub fn into_entity(self) -> Result<BadgeClass, RepoError> {
        let now = Timestamp::now();
        let badge_class = BadgeClass {
            id: Iri::generate(),
            issuer: self.issuer,
            name: self.name,
            description: self.description,
            image: self.image,
            criteria: self.criteria,
            alignment: self.alignment,
            tags: self.tags,
            version: self.version,
            previous_version: self.previous_version,
            related: self.related,
            endorsement: self.endorsement,
            additional_fields: self.additional_fields,
            created_at: now,
            updated_at: now,
        };
        badge_class.validate()?;
        Ok(badge_class)
    }
}
