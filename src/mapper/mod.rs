//! # Mappers
//!
//! Per-entity Data-Mapper functions that translate a fetched row into a
//! domain entity, enforcing invariants at the boundary: row-to-entity
//! conversion is where invariant enforcement lives for data coming back
//! out of storage. Entity-to-row conversion (for `INSERT`/`UPDATE`) is
//! the responsibility of the repository that binds query parameters
//! directly from entity fields via `crate::convert`; only the row-reading
//! direction benefits from a dedicated mapper, since that is where a
//! corrupted or unexpectedly-shaped row must be caught before it reaches
//! a caller.

pub mod assertion;
pub mod badge_class;
pub mod issuer;
pub mod status_entry;
pub mod status_list;
