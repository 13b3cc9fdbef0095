use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RepoError;

/// An opaque, URI-shaped identifier. Stable once issued.
///
/// Primary-key IRIs generated by this crate are UUIDv4-based and validated
/// as UUID-shaped at the boundary; IRIs supplied by an external caller
/// (`Issuer.url`, `BadgeClass.image`, …) are accepted as any non-empty
/// URI-shaped string, since the external ID-generator contract only binds
/// primary keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Default for Iri {
    /// An empty placeholder, distinct from any IRI `new`/`parse_uuid`
    /// would accept. Exists so `#[derive(Default)]` works on structs
    /// like `NewIssuer` that embed an `Iri` directly; callers must
    /// overwrite it with a real value before `into_entity` validates.
    fn default() -> Self {
        Self(String::new())
    }
}

impl Iri {
    /// Wrap an arbitrary non-empty URI-shaped string without requiring
    /// UUID shape (for `url`, `image`, and other externally-supplied
    /// IRIs).
    pub fn new(value: impl Into<String>) -> Result<Self, RepoError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(RepoError::Validation("IRI must not be empty".to_string()));
        }
        Ok(Self(value))
    }

    /// Parse a primary-key IRI, validating that it is UUID-shaped (this
    /// crate's ID generator only ever produces UUIDv4 IRIs for primary
    /// keys).
    pub fn parse_uuid(value: impl Into<String>) -> Result<Self, RepoError> {
        let value = value.into();
        uuid::Uuid::parse_str(&value)
            .map_err(|e| RepoError::Validation(format!("not a UUID-shaped IRI: {e}")))?;
        Ok(Self(value))
    }

    /// Generate a fresh primary-key IRI (UUIDv4).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Iri> for String {
    fn from(iri: Iri) -> Self {
        iri.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_is_uuid_shaped() {
        let iri = Iri::generate();
        assert!(Iri::parse_uuid(iri.as_str().to_string()).is_ok());
    }

    #[test]
    fn empty_string_rejected() {
        assert!(Iri::new("").is_err());
        assert!(Iri::new("   ").is_err());
    }

    #[test]
    fn non_uuid_url_accepted_as_plain_iri() {
        assert!(Iri::new("https://acme.example").is_ok());
        assert!(Iri::parse_uuid("https://acme.example").is_err());
    }
}
