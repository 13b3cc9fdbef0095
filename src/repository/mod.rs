//! # Repository Contract
//!
//! One repository per entity, each a thin typed wrapper over a
//! [`crate::backend::DbBackend`] that maps domain-entity calls onto the
//! backend's native SQL dialect. `base` supplies the cross-cutting pieces
//! every repository shares: pagination validation, redaction-aware
//! logging fields, and structured operation logging.

mod assertion;
mod badge_class;
mod base;
mod issuer;

pub use assertion::AssertionRepository;
pub use badge_class::BadgeClassRepository;
pub use base::{OperationLog, Pagination, Sensitive};
pub use issuer::IssuerRepository;
