use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::convert::Iri;
use crate::error::RepoError;

/// `Issuer.image` and `BadgeClass.image` may be stored either as a plain
/// IRI string or as a structured image object. The mapper preserves
/// whichever shape was originally stored rather than normalizing to one
/// or the other.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageRef {
    /// A bare IRI pointing at the image.
    Iri(Iri),
    /// A structured image object (at minimum an `id`, plus arbitrary
    /// extension fields).
    Object(ImageObject),
}

/// Structured image object shape, with any fields the caller sent beyond
/// `id`/`type` passed through verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageObject {
    /// The image's own IRI.
    pub id: Iri,
    /// Type discriminator, e.g. `"Image"`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    /// Any other fields present on the object.
    #[serde(flatten)]
    pub additional_fields: serde_json::Map<String, Value>,
}

impl ImageRef {
    /// Serialize to the JSON value persisted in a JSONB column.
    pub fn to_json(&self) -> Result<Value, RepoError> {
        serde_json::to_value(self)
            .map_err(|e| RepoError::Internal(format!("image serialization failed: {e}")))
    }

    /// Parse back from a JSON value (JSONB column) or a JSON text blob
    /// (text-backend column, already parsed by the mapper before this is
    /// called).
    pub fn from_json(value: &Value) -> Result<Self, RepoError> {
        serde_json::from_value(value.clone())
            .map_err(|e| RepoError::Corruption(format!("invalid image value: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iri_variant_round_trips() {
        let image = ImageRef::Iri(Iri::new("https://acme.example/logo.png").unwrap());
        let json = image.to_json().unwrap();
        assert_eq!(json, Value::String("https://acme.example/logo.png".to_string()));
        let restored = ImageRef::from_json(&json).unwrap();
        assert_eq!(restored, image);
    }

    #[test]
    fn object_variant_preserves_additional_fields() {
        let mut additional = serde_json::Map::new();
        additional.insert("caption".to_string(), Value::String("Widget logo".to_string()));
        let image = ImageRef::Object(ImageObject {
            id: Iri::new("https://acme.example/logo.png").unwrap(),
            type_: Some("Image".to_string()),
            additional_fields: additional,
        });
        let json = image.to_json().unwrap();
        let restored = ImageRef::from_json(&json).unwrap();
        assert_eq!(restored, image);
    }
}
