use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reason a status-list bit is read. Mirrors the four purposes defined by
/// the Bitstring Status List specification; defined locally since this
/// crate owns no JSON-LD proof/claims machinery to import it from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPurpose {
    /// Credential has been revoked.
    Revocation,
    /// Credential has been temporarily suspended.
    Suspension,
    /// Credential content should be refreshed from a newer source.
    Refresh,
    /// Arbitrary multi-bit application message (`statusSize > 1`).
    Message,
}

impl fmt::Display for StatusPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Revocation => "revocation",
            Self::Suspension => "suspension",
            Self::Refresh => "refresh",
            Self::Message => "message",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for StatusPurpose {
    type Err = crate::error::RepoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revocation" => Ok(Self::Revocation),
            "suspension" => Ok(Self::Suspension),
            "refresh" => Ok(Self::Refresh),
            "message" => Ok(Self::Message),
            other => Err(Self::Err::Corruption(format!("unknown status purpose: {other}"))),
        }
    }
}

/// An assertion's recipient. Either an Open Badges 2.0-shaped identity
/// object or an arbitrary W3C Verifiable Credentials `credentialSubject`.
/// An untagged enum, so serde picks the variant from the shape of the
/// JSON alone: "either a plain shape or a structured one".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recipient {
    /// Open Badges 2.0 identity object, optionally salted and hashed.
    Identity {
        /// Identity type, e.g. `"email"`.
        #[serde(rename = "type")]
        type_: String,
        /// The identity value, or its hash if `hashed` is `true`.
        identity: String,
        /// Whether `identity` is a hash rather than a plain value.
        hashed: bool,
        /// Salt used when hashing, required if `hashed` is `true`.
        #[serde(skip_serializing_if = "Option::is_none")]
        salt: Option<String>,
    },
    /// A W3C VC `credentialSubject` object, stored opaquely.
    CredentialSubject(Value),
}

/// `Assertion.verification`: either an Open Badges 2.0
/// `VerificationObject`, a W3C VC `Proof`, or a `CredentialStatus`
/// reference. Stored opaquely — the crypto/signing layer that produces
/// this material is out of scope here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Verification {
    /// Open Badges 2.0-style verification object.
    VerificationObject(Value),
    /// W3C VC linked-data or JWT proof.
    Proof(Value),
    /// A reference to a `CredentialStatus` entry.
    CredentialStatus(Value),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    #[test]
    fn status_purpose_round_trips_through_display_and_from_str() {
        for purpose in
            [StatusPurpose::Revocation, StatusPurpose::Suspension, StatusPurpose::Refresh, StatusPurpose::Message]
        {
            let s = purpose.to_string();
            assert_eq!(StatusPurpose::from_str(&s).unwrap(), purpose);
        }
    }

    #[test]
    fn unknown_purpose_text_is_corruption() {
        assert!(StatusPurpose::from_str("bogus").is_err());
    }

    #[test]
    fn recipient_identity_shape_deserializes() {
        let value = json!({"type": "email", "identity": "a@b.test", "hashed": false});
        let recipient: Recipient = serde_json::from_value(value).unwrap();
        assert!(matches!(recipient, Recipient::Identity { hashed: false, .. }));
    }

    #[test]
    fn recipient_credential_subject_shape_deserializes() {
        let value = json!({"id": "did:example:123", "achievement": {"id": "urn:uuid:abc"}});
        let recipient: Recipient = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(recipient, Recipient::CredentialSubject(value));
    }
}
