use std::sync::Arc;

use tracing::instrument;

use crate::cache::registry::CacheRegistry;
use crate::convert::Iri;
use crate::error::RepoError;
use crate::model::{Assertion, AssertionPatch, NewAssertion};
use crate::repository::Pagination;
use crate::repository::AssertionRepository;

fn badge_class_key(badge_class: &Iri, pagination: Pagination) -> String {
    format!("{badge_class}|{}|{}", pagination.limit, pagination.offset)
}

fn recipient_key(recipient_identity: &str, pagination: Pagination) -> String {
    format!("{recipient_identity}|{}|{}", pagination.limit, pagination.offset)
}

/// Read-through, write-invalidate decorator over [`AssertionRepository`].
/// `find_by_badge_class` and `find_by_recipient` are each cached
/// per `(key, limit, offset)`; writes clear the affected families
/// wholesale.
pub struct CachedAssertionRepository {
    inner: AssertionRepository,
    cache: Arc<CacheRegistry>,
}

impl CachedAssertionRepository {
    /// Wrap `inner`, sharing `cache` with the other decorators built
    /// from the same factory.
    #[must_use]
    pub const fn new(inner: AssertionRepository, cache: Arc<CacheRegistry>) -> Self {
        Self { inner, cache }
    }

    /// Insert a new assertion, invalidating its badge class's and
    /// recipient's cached listings.
    #[instrument(level = "debug", skip(self, new))]
    pub async fn create(&self, new: NewAssertion) -> Result<Assertion, RepoError> {
        let created = self.inner.create(new).await?;
        // Keyed per-page; a bare badge-class id can't be targeted precisely.
        self.cache.assertions_by_badge_class.clear().await;
        self.cache.assertions_by_recipient.clear().await;
        Ok(created)
    }

    /// Look up an assertion by id, populating the cache on miss.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_id(&self, id: &Iri) -> Result<Option<Assertion>, RepoError> {
        if let Some(hit) = self.cache.assertion_by_id.get(id).await {
            return Ok(Some(hit));
        }
        let found = self.inner.find_by_id(id).await?;
        if let Some(assertion) = &found {
            self.cache.assertion_by_id.insert(id.clone(), assertion.clone()).await;
        }
        Ok(found)
    }

    /// Update an assertion (including revocation), invalidating its own
    /// key and every listing family it could appear in.
    #[instrument(level = "debug", skip(self, patch))]
    pub async fn update(&self, id: &Iri, patch: AssertionPatch) -> Result<Assertion, RepoError> {
        let updated = self.inner.update(id, patch).await?;
        self.cache.assertion_by_id.invalidate(id).await;
        self.cache.assertions_by_badge_class.clear().await;
        self.cache.assertions_by_recipient.clear().await;
        Ok(updated)
    }

    /// Delete an assertion, clearing its own key and every listing
    /// family it could have appeared in.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, id: &Iri) -> Result<bool, RepoError> {
        let deleted = self.inner.delete(id).await?;
        if deleted {
            self.cache.assertion_by_id.invalidate(id).await;
            self.cache.assertions_by_badge_class.clear().await;
            self.cache.assertions_by_recipient.clear().await;
        }
        Ok(deleted)
    }

    /// List assertions issued against a `BadgeClass`, cached per page.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_badge_class(
        &self,
        badge_class: &Iri,
        pagination: Pagination,
    ) -> Result<Vec<Assertion>, RepoError> {
        let key = badge_class_key(badge_class, pagination);
        if let Some(hit) = self.cache.assertions_by_badge_class.get(&key).await {
            return Ok(hit);
        }
        let found = self.inner.find_by_badge_class(badge_class, pagination).await?;
        self.cache.assertions_by_badge_class.insert(key, found.clone()).await;
        Ok(found)
    }

    /// List assertions by recipient identity, cached per page.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_recipient(
        &self,
        recipient_identity: &str,
        pagination: Pagination,
    ) -> Result<Vec<Assertion>, RepoError> {
        let key = recipient_key(recipient_identity, pagination);
        if let Some(hit) = self.cache.assertions_by_recipient.get(&key).await {
            return Ok(hit);
        }
        let found = self.inner.find_by_recipient(recipient_identity, pagination).await?;
        self.cache.assertions_by_recipient.insert(key, found.clone()).await;
        Ok(found)
    }
}
