//! # Domain Entity Contracts
//!
//! The five core entity shapes — Issuer, BadgeClass, Assertion,
//! StatusList, CredentialStatusEntry — and their create/validate
//! semantics. Unknown keys on a
//! caller's payload are routed into `additional_fields` so round-trips
//! through storage never silently drop data (see `crate::convert` for
//! the wire-format boundary these entities never cross directly).

mod assertion;
mod badge_class;
mod common;
mod issuer;
mod patch;
mod status_entry;
mod status_list;

pub use assertion::{Assertion, AssertionPatch, NewAssertion};
pub use badge_class::{BadgeClass, BadgeClassPatch, NewBadgeClass};
pub use common::{Recipient, StatusPurpose, Verification};
pub use issuer::{Issuer, IssuerPatch, NewIssuer};
pub use patch::Patch;
pub use status_entry::CredentialStatusEntry;
pub use status_list::{StatusList, MIN_TOTAL_ENTRIES};
