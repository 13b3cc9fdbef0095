use std::sync::Arc;

use tracing::instrument;

use crate::cache::registry::CacheRegistry;
use crate::convert::Iri;
use crate::error::RepoError;
use crate::model::{Issuer, IssuerPatch, NewIssuer};
use crate::repository::Pagination;
use crate::repository::IssuerRepository;

/// Read-through, write-invalidate decorator over [`IssuerRepository`].
/// Single-entity reads are cached by id; listing methods bypass
/// the cache, since they are not part of a tracked key family.
pub struct CachedIssuerRepository {
    inner: IssuerRepository,
    cache: Arc<CacheRegistry>,
}

impl CachedIssuerRepository {
    /// Wrap `inner`, sharing `cache` with the other decorators built
    /// from the same factory.
    #[must_use]
    pub const fn new(inner: IssuerRepository, cache: Arc<CacheRegistry>) -> Self {
        Self { inner, cache }
    }

    /// Insert a new issuer. Nothing to invalidate; a freshly created id
    /// cannot already be cached.
    #[instrument(level = "debug", skip(self, new))]
    pub async fn create(&self, new: NewIssuer) -> Result<Issuer, RepoError> {
        self.inner.create(new).await
    }

    /// Look up an issuer by id, populating the cache on miss.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_by_id(&self, id: &Iri) -> Result<Option<Issuer>, RepoError> {
        if let Some(hit) = self.cache.issuer_by_id.get(id).await {
            return Ok(Some(hit));
        }
        let found = self.inner.find_by_id(id).await?;
        if let Some(issuer) = &found {
            self.cache.issuer_by_id.insert(id.clone(), issuer.clone()).await;
        }
        Ok(found)
    }

    /// Update an issuer, invalidating its cached entry on success.
    #[instrument(level = "debug", skip(self, patch))]
    pub async fn update(&self, id: &Iri, patch: IssuerPatch) -> Result<Issuer, RepoError> {
        let updated = self.inner.update(id, patch).await?;
        self.cache.issuer_by_id.invalidate(id).await;
        Ok(updated)
    }

    /// Delete an issuer, cascading invalidation to every dependent
    /// `BadgeClass`/`Assertion` key family.
    #[instrument(level = "debug", skip(self))]
    pub async fn delete(&self, id: &Iri) -> Result<bool, RepoError> {
        let deleted = self.inner.delete(id).await?;
        if deleted {
            self.cache.invalidate_issuer_cascade(id).await;
        }
        Ok(deleted)
    }

    /// List every issuer. Not cached.
    pub async fn find_all(&self) -> Result<Vec<Issuer>, RepoError> {
        self.inner.find_all().await
    }

    /// Paginated listing. Not cached.
    #[instrument(level = "debug", skip(self))]
    pub async fn find_all_page(&self, pagination: Pagination) -> Result<Vec<Issuer>, RepoError> {
        self.inner.find_all_page(pagination).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::*;
    use crate::backend::DbBackend;
    use crate::config::{DatabaseConfig, DatabaseType, SyncMode};

    async fn cached_repo() -> CachedIssuerRepository {
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
        let backend = DbBackend::connect(&config).await.unwrap();
        let repo = IssuerRepository::new(Arc::new(backend));
        CachedIssuerRepository::new(repo, Arc::new(CacheRegistry::new()))
    }

    fn new_issuer() -> NewIssuer {
        NewIssuer {
            name: json!("Acme"),
            url: Iri::new("https://acme.example").unwrap(),
            email: None,
            description: None,
            image: None,
            public_key: None,
            additional_fields: Map::new(),
        }
    }

    #[tokio::test]
    async fn find_by_id_populates_cache_on_miss() {
        let repo = cached_repo().await;
        let created = repo.create(new_issuer()).await.unwrap();
        assert!(repo.cache.issuer_by_id.get(&created.id).await.is_none());
        repo.find_by_id(&created.id).await.unwrap();
        assert!(repo.cache.issuer_by_id.get(&created.id).await.is_some());
    }

    #[tokio::test]
    async fn update_invalidates_cached_entry() {
        let repo = cached_repo().await;
        let created = repo.create(new_issuer()).await.unwrap();
        repo.find_by_id(&created.id).await.unwrap();
        assert!(repo.cache.issuer_by_id.get(&created.id).await.is_some());

        repo.update(&created.id, IssuerPatch { name: crate::model::Patch::Set(json!("New")), ..Default::default() })
            .await
            .unwrap();
        assert!(repo.cache.issuer_by_id.get(&created.id).await.is_none());
    }

    #[tokio::test]
    async fn stale_cache_hit_is_never_returned_after_delete() {
        let repo = cached_repo().await;
        let created = repo.create(new_issuer()).await.unwrap();
        repo.find_by_id(&created.id).await.unwrap();
        repo.delete(&created.id).await.unwrap();
        assert!(repo.find_by_id(&created.id).await.unwrap().is_none());
    }
}
