//! # Status-List Engine
//!
//! Bit-packing, GZIP/base64url codec, atomic slot allocation, and
//! status mutation for the shared revocation/suspension bitstring. Each
//! `StatusList` row is a per-`(issuer, purpose, statusSize)` bitstring
//! mutated incrementally via read-modify-write, rather than rebuilt
//! fresh from a log of entries.

pub mod codec;
mod repository;

pub use repository::{StatusListRepository, StatusListStats};
