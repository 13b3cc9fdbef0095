//! # Read-Through Cache Decorators
//!
//! In-process caching over the three hot repositories. Each
//! `Cached*Repository` wraps its corresponding repository and shares a
//! single [`CacheRegistry`] so writes can invalidate across entities —
//! deleting an `Issuer` must also flush its `BadgeClass`es' and
//! `Assertion`s' cached entries, not just its own.
//!
//! Reads look the key up first; a miss delegates to the wrapped
//! repository and populates the cache. Writes always delegate first,
//! then invalidate on success — a failed write never touches the cache.

mod assertion;
mod badge_class;
mod issuer;
mod registry;
mod store;

pub use assertion::CachedAssertionRepository;
pub use badge_class::CachedBadgeClassRepository;
pub use issuer::CachedIssuerRepository;
pub(crate) use registry::CacheRegistry;
