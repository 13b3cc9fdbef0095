use std::sync::Arc;

use tracing::instrument;

use crate::cache::registry::CacheRegistry;
use crate::convert::Iri;
use crate::error::RepoError;
use crate::model::{BadgeClass, BadgeClassPatch, NewBadgeClass};
use crate::repository::Pagination;
use crate::repository::BadgeClassRepository;

fn list_key(issuer: &Iri, pagination: Pagination) -> String {
    format!("{issuer}|{}|{}", pagination.limit, pagination.offset)
}

/// Read-through, write-invalidate decorator over
/// [`BadgeClassRepository`]. `find_by_issuer` is cached per
/// `(issuer, limit, offset)`; writes clear the whole
/// `badge_classes_by_issuer` family for the affected issuer rather than
/// targeting one page.
pub struct CachedBadgeClassRepository {
    inner: BadgeClassRepository,
    cache: Arc<CacheRegistry>,
}

impl CachedBadgeClassRepository {
    /// Wrap `inner`, sharing `cache` with the other decorators built
    /// from the same factory.
    #[must_use]
    pub const fn new(inner: BadgeClassRepository, cache: Arc<CacheRegistry>) -> Self {
        Self { inner, cache }
    }

    /// Insert a new badge class, invalidating its issuer's cached
    /// listings.
    #[instrument(level = "debug", skip(self, new))]
    pub async fn create(&self, new: NewBadgeClass) -> Result<BadgeClass, RepoError> {
        let created = self.inner.create(new).await?;
        // Keyed per-page; a fresh issuer id can't be targeted precisely.
        self.cache.badge_classes_by_issuer.clear().await;
        Ok(created)
    }

    /// Look up a badge class by id, populating the cache on miss.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_id(&self, id: &Iri) -> Result<Option<BadgeClass>, RepoError> {
        if let Some(hit) = self.cache.badge_class_by_id.get(id).await {
            return Ok(Some(hit));
        }
        let found = self.inner.find_by_id(id).await?;
        if let Some(badge_class) = &found {
            self.cache.badge_class_by_id.insert(id.clone(), badge_class.clone()).await;
        }
        Ok(found)
    }

    /// Update a badge class, invalidating its own key and its issuer's
    /// cached listings.
    #[instrument(level = "debug", skip(self, patch))]
    pub async fn update(&self, id: &Iri, patch: BadgeClassPatch) -> Result<BadgeClass, RepoError> {
        let updated = self.inner.update(id, patch).await?;
        self.cache.badge_class_by_id.invalidate(id).await;
        self.cache.badge_classes_by_issuer.clear().await;
        Ok(updated)
    }

    /// Delete a badge class, cascading invalidation to every dependent
    /// `Assertion` key family.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, id: &Iri) -> Result<bool, RepoError> {
        let deleted = self.inner.delete(id).await?;
        if deleted {
            self.cache.invalidate_badge_class_cascade(id).await;
        }
        Ok(deleted)
    }

    /// List badge classes belonging to an issuer, cached per page.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_issuer(&self, issuer: &Iri, pagination: Pagination) -> Result<Vec<BadgeClass>, RepoError> {
        let key = list_key(issuer, pagination);
        if let Some(hit) = self.cache.badge_classes_by_issuer.get(&key).await {
            return Ok(hit);
        }
        let found = self.inner.find_by_issuer(issuer, pagination).await?;
        self.cache.badge_classes_by_issuer.insert(key, found.clone()).await;
        Ok(found)
    }

    /// Walk the `previousVersion` chain. Not cached, since chains are
    /// rarely re-walked and the per-hop reads already go through
    /// `find_by_id`-equivalent lookups internally.
    pub async fn find_version_chain(&self, badge_class: &BadgeClass) -> Result<Vec<BadgeClass>, RepoError> {
        self.inner.find_version_chain(badge_class).await
    }

    /// Validate a `previousVersion` chain. Not cached.
    pub async fn validate_version_chain(&self, badge_class: &BadgeClass) -> Result<(), RepoError> {
        self.inner.validate_version_chain(badge_class).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::*;
    use crate::backend::DbBackend;
    use crate::config::{DatabaseConfig, DatabaseType, SyncMode};
    use crate::convert::ImageRef;
    use crate::model::NewIssuer;
    use crate::repository::IssuerRepository;

    async fn backend() -> Arc<DbBackend> {
        let config = DatabaseConfig {
            db_type: DatabaseType::Sqlite,
            connection_string: None,
            sqlite_file: Some(":memory:".to_string()),
            sqlite_busy_timeout: 5_000,
            sqlite_sync_mode: SyncMode::Normal,
            sqlite_cache_size: 10_000,
            pool_max: 1,
            idle_timeout_sec: 30,
            connect_timeout_sec: 10,
            max_lifetime_sec: 3_600,
        };
        Arc::new(DbBackend::connect(&config).await.unwrap())
    }

    async fn seeded_issuer(backend: &Arc<DbBackend>) -> Iri {
        let repo = IssuerRepository::new(Arc::clone(backend));
        let issuer = repo
            .create(NewIssuer {
                name: json!("Acme"),
                url: Iri::new("https://acme.example").unwrap(),
                email: None,
                description: None,
                image: None,
                public_key: None,
                additional_fields: Map::new(),
            })
            .await
            .unwrap();
        issuer.id
    }

    fn new_badge_class(issuer: Iri) -> NewBadgeClass {
        NewBadgeClass {
            issuer,
            name: json!("Widget Wrangler"),
            description: "Shipped a widget".to_string(),
            image: ImageRef::Iri(Iri::new("https://acme.example/badge.png").unwrap()),
            criteria: json!({"narrative": "ship widget"}),
            alignment: None,
            tags: None,
            version: None,
            previous_version: None,
            related: None,
            endorsement: None,
            additional_fields: Map::new(),
        }
    }

    async fn cached_repo(backend: Arc<DbBackend>) -> CachedBadgeClassRepository {
        let repo = BadgeClassRepository::new(backend);
        CachedBadgeClassRepository::new(repo, Arc::new(CacheRegistry::new()))
    }

    #[tokio::test]
    async fn find_by_id_populates_cache_on_miss() {
        let backend = backend().await;
        let issuer = seeded_issuer(&backend).await;
        let repo = cached_repo(backend).await;
        let created = repo.create(new_badge_class(issuer)).await.unwrap();

        assert!(repo.cache.badge_class_by_id.get(&created.id).await.is_none());
        repo.find_by_id(&created.id).await.unwrap();
        assert!(repo.cache.badge_class_by_id.get(&created.id).await.is_some());
    }

    #[tokio::test]
    async fn find_by_issuer_page_is_served_from_cache_on_second_call() {
        let backend = backend().await;
        let issuer = seeded_issuer(&backend).await;
        let repo = cached_repo(backend).await;
        repo.create(new_badge_class(issuer.clone())).await.unwrap();

        let pagination = Pagination { limit: 10, offset: 0 };
        let key = list_key(&issuer, pagination);
        assert!(repo.cache.badge_classes_by_issuer.get(&key).await.is_none());
        let first = repo.find_by_issuer(&issuer, pagination).await.unwrap();
        assert!(repo.cache.badge_classes_by_issuer.get(&key).await.is_some());
        let second = repo.find_by_issuer(&issuer, pagination).await.unwrap();
        assert_eq!(first.len(), second.len());
    }

    #[tokio::test]
    async fn delete_clears_its_own_key_and_the_issuer_listing() {
        let backend = backend().await;
        let issuer = seeded_issuer(&backend).await;
        let repo = cached_repo(backend).await;
        let created = repo.create(new_badge_class(issuer.clone())).await.unwrap();

        let pagination = Pagination { limit: 10, offset: 0 };
        repo.find_by_issuer(&issuer, pagination).await.unwrap();
        repo.find_by_id(&created.id).await.unwrap();

        repo.delete(&created.id).await.unwrap();

        assert!(repo.cache.badge_class_by_id.get(&created.id).await.is_none());
        let key = list_key(&issuer, pagination);
        assert!(repo.cache.badge_classes_by_issuer.get(&key).await.is_none());
    }
}
