//! # Repository Factory
//!
//! The process-wide coordinator that owns the single backend connection
//! and cache registry for the process's lifetime, and hands out typed
//! repositories over them. Guarded by a `tokio::sync::Mutex` over
//! its lifecycle state plus a `tokio::sync::Notify` so concurrent
//! `initialize` callers share one in-flight attempt instead of racing to
//! open the backend twice.

use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{instrument, warn};

use crate::backend::{BackendHealth, DbBackend};
use crate::cache::{CacheRegistry, CachedAssertionRepository, CachedBadgeClassRepository, CachedIssuerRepository};
use crate::config::RepositoryConfig;
use crate::error::RepoError;
use crate::model::{Assertion, AssertionPatch, BadgeClass, BadgeClassPatch, Issuer, IssuerPatch, NewAssertion, NewBadgeClass, NewIssuer};
use crate::repository::{AssertionRepository, BadgeClassRepository, IssuerRepository, Pagination};
use crate::status::StatusListRepository;

/// Lifecycle state of a [`RepositoryFactory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FactoryState {
    Uninitialized,
    Initializing,
    Ready,
    Closing,
    Closed,
}

struct Inner {
    state: FactoryState,
    backend: Option<Arc<DbBackend>>,
    cache: Option<Arc<CacheRegistry>>,
    cache_enabled: bool,
}

/// A repository over the `issuers` table, cache-wrapped or not depending
/// on the config the factory was initialized with. Callers are
/// indifferent to which: both variants expose the same operations.
pub enum IssuerRepositoryHandle {
    /// Caching enabled.
    Cached(CachedIssuerRepository),
    /// Caching disabled; calls go straight to the backend.
    Direct(IssuerRepository),
}

impl IssuerRepositoryHandle {
    /// Insert a new issuer.
    pub async fn create(&self, new: NewIssuer) -> Result<Issuer, RepoError> {
        match self {
            Self::Cached(repo) => repo.create(new).await,
            Self::Direct(repo) => repo.create(new).await,
        }
    }

    /// Look up an issuer by id.
    pub async fn find_by_id(&self, id: &crate::convert::Iri) -> Result<Option<Issuer>, RepoError> {
        match self {
            Self::Cached(repo) => repo.find_by_id(id).await,
            Self::Direct(repo) => repo.find_by_id(id).await,
        }
    }

    /// Update an issuer.
    pub async fn update(&self, id: &crate::convert::Iri, patch: IssuerPatch) -> Result<Issuer, RepoError> {
        match self {
            Self::Cached(repo) => repo.update(id, patch).await,
            Self::Direct(repo) => repo.update(id, patch).await,
        }
    }

    /// Delete an issuer.
    pub async fn delete(&self, id: &crate::convert::Iri) -> Result<bool, RepoError> {
        match self {
            Self::Cached(repo) => repo.delete(id).await,
            Self::Direct(repo) => repo.delete(id).await,
        }
    }

    /// List every issuer.
    pub async fn find_all(&self) -> Result<Vec<Issuer>, RepoError> {
        match self {
            Self::Cached(repo) => repo.find_all().await,
            Self::Direct(repo) => repo.find_all().await,
        }
    }

    /// Paginated listing.
    pub async fn find_all_page(&self, pagination: Pagination) -> Result<Vec<Issuer>, RepoError> {
        match self {
            Self::Cached(repo) => repo.find_all_page(pagination).await,
            Self::Direct(repo) => repo.find_all_page(pagination).await,
        }
    }
}

/// A repository over the `badge_classes` table, cache-wrapped or not.
pub enum BadgeClassRepositoryHandle {
    /// Caching enabled.
    Cached(CachedBadgeClassRepository),
    /// Caching disabled.
    Direct(BadgeClassRepository),
}

impl BadgeClassRepositoryHandle {
    /// Insert a new badge class.
    pub async fn create(&self, new: NewBadgeClass) -> Result<BadgeClass, RepoError> {
        match self {
            Self::Cached(repo) => repo.create(new).await,
            Self::Direct(repo) => repo.create(new).await,
        }
    }

    /// Look up a badge class by id.
    pub async fn find_by_id(&self, id: &crate::convert::Iri) -> Result<Option<BadgeClass>, RepoError> {
        match self {
            Self::Cached(repo) => repo.find_by_id(id).await,
            Self::Direct(repo) => repo.find_by_id(id).await,
        }
    }

    /// Update a badge class.
    pub async fn update(&self, id: &crate::convert::Iri, patch: BadgeClassPatch) -> Result<BadgeClass, RepoError> {
        match self {
            Self::Cached(repo) => repo.update(id, patch).await,
            Self::Direct(repo) => repo.update(id, patch).await,
        }
    }

    /// Delete a badge class.
    pub async fn delete(&self, id: &crate::convert::Iri) -> Result<bool, RepoError> {
        match self {
            Self::Cached(repo) => repo.delete(id).await,
            Self::Direct(repo) => repo.delete(id).await,
        }
    }

    /// List badge classes belonging to an issuer, paginated.
    pub async fn find_by_issuer(
        &self,
        issuer: &crate::convert::Iri,
        pagination: Pagination,
    ) -> Result<Vec<BadgeClass>, RepoError> {
        match self {
            Self::Cached(repo) => repo.find_by_issuer(issuer, pagination).await,
            Self::Direct(repo) => repo.find_by_issuer(issuer, pagination).await,
        }
    }

    /// Walk the `previousVersion` chain.
    pub async fn find_version_chain(&self, badge_class: &BadgeClass) -> Result<Vec<BadgeClass>, RepoError> {
        match self {
            Self::Cached(repo) => repo.find_version_chain(badge_class).await,
            Self::Direct(repo) => repo.find_version_chain(badge_class).await,
        }
    }

    /// Validate a `previousVersion` chain.
    pub async fn validate_version_chain(&self, badge_class: &BadgeClass) -> Result<(), RepoError> {
        match self {
            Self::Cached(repo) => repo.validate_version_chain(badge_class).await,
            Self::Direct(repo) => repo.validate_version_chain(badge_class).await,
        }
    }
}

/// A repository over the `assertions` table, cache-wrapped or not.
pub enum AssertionRepositoryHandle {
    /// Caching enabled.
    Cached(CachedAssertionRepository),
    /// Caching disabled.
    Direct(AssertionRepository),
}

impl AssertionRepositoryHandle {
    /// Insert a new assertion.
    pub async fn create(&self, new: NewAssertion) -> Result<Assertion, RepoError> {
        match self {
            Self::Cached(repo) => repo.create(new).await,
            Self::Direct(repo) => repo.create(new).await,
        }
    }

    /// Look up an assertion by id.
    pub async fn find_by_id(&self, id: &crate::convert::Iri) -> Result<Option<Assertion>, RepoError> {
        match self {
            Self::Cached(repo) => repo.find_by_id(id).await,
            Self::Direct(repo) => repo.find_by_id(id).await,
        }
    }

    /// Update an assertion.
    pub async fn update(&self, id: &crate::convert::Iri, patch: AssertionPatch) -> Result<Assertion, RepoError> {
        match self {
            Self::Cached(repo) => repo.update(id, patch).await,
            Self::Direct(repo) => repo.update(id, patch).await,
        }
    }

    /// Delete an assertion.
    pub async fn delete(&self, id: &crate::convert::Iri) -> Result<bool, RepoError> {
        match self {
            Self::Cached(repo) => repo.delete(id).await,
            Self::Direct(repo) => repo.delete(id).await,
        }
    }

    /// List assertions issued against a `BadgeClass`, paginated.
    pub async fn find_by_badge_class(
        &self,
        badge_class: &crate::convert::Iri,
        pagination: Pagination,
    ) -> Result<Vec<Assertion>, RepoError> {
        match self {
            Self::Cached(repo) => repo.find_by_badge_class(badge_class, pagination).await,
            Self::Direct(repo) => repo.find_by_badge_class(badge_class, pagination).await,
        }
    }

    /// List assertions by recipient identity, paginated.
    pub async fn find_by_recipient(
        &self,
        recipient_identity: &str,
        pagination: Pagination,
    ) -> Result<Vec<Assertion>, RepoError> {
        match self {
            Self::Cached(repo) => repo.find_by_recipient(recipient_identity, pagination).await,
            Self::Direct(repo) => repo.find_by_recipient(recipient_identity, pagination).await,
        }
    }
}

/// Process-wide coordinator owning one backend connection and cache
/// registry for its lifetime, and handing out repositories over them.
/// Construct one per process (or per test); `initialize` must run
/// before any `createXRepository` call.
pub struct RepositoryFactory {
    inner: Mutex<Inner>,
    ready_notify: Notify,
}

impl Default for RepositoryFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryFactory {
    /// Build an uninitialized factory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner { state: FactoryState::Uninitialized, backend: None, cache: None, cache_enabled: false }),
            ready_notify: Notify::new(),
        }
    }

    /// Open the backend-specific connection resources and move to
    /// `Ready`. Concurrent callers share one in-flight attempt: a caller
    /// that arrives while another is initializing awaits the same
    /// result rather than racing to open the backend twice. Already
    /// `Ready` is a no-op with a warning.
    #[instrument(level = "debug", skip(self, config))]
    pub async fn initialize(&self, config: &RepositoryConfig) -> Result<(), RepoError> {
        loop {
            let mut guard = self.inner.lock().await;
            match guard.state {
                FactoryState::Ready => {
                    warn!("RepositoryFactory::initialize called while already Ready");
                    return Ok(());
                }
                FactoryState::Initializing | FactoryState::Closing => {
                    drop(guard);
                    self.ready_notify.notified().await;
                }
                FactoryState::Uninitialized | FactoryState::Closed => {
                    guard.state = FactoryState::Initializing;
                    drop(guard);
                    break;
                }
            }
        }

        let connected = DbBackend::connect(&config.database).await;
        let mut guard = self.inner.lock().await;
        match connected {
            Ok(backend) => {
                guard.backend = Some(Arc::new(backend));
                guard.cache = Some(Arc::new(CacheRegistry::new()));
                guard.cache_enabled = config.cache.enabled;
                guard.state = FactoryState::Ready;
                drop(guard);
                self.ready_notify.notify_waiters();
                Ok(())
            }
            Err(e) => {
                guard.state = FactoryState::Uninitialized;
                drop(guard);
                self.ready_notify.notify_waiters();
                Err(e)
            }
        }
    }

    async fn ready_backend(&self) -> Result<(Arc<DbBackend>, Arc<CacheRegistry>, bool), RepoError> {
        let guard = self.inner.lock().await;
        if guard.state != FactoryState::Ready {
            return Err(RepoError::BackendUnavailable(
                "RepositoryFactory is not Ready; call initialize() first".to_string(),
            ));
        }
        let backend = guard.backend.clone().expect("backend present while Ready");
        let cache = guard.cache.clone().expect("cache present while Ready");
        Ok((backend, cache, guard.cache_enabled))
    }

    /// Build an `Issuer` repository, cache-wrapped iff caching is
    /// enabled. Requires `Ready`.
    pub async fn create_issuer_repository(&self) -> Result<IssuerRepositoryHandle, RepoError> {
        let (backend, cache, cache_enabled) = self.ready_backend().await?;
        let repo = IssuerRepository::new(backend);
        Ok(if cache_enabled {
            IssuerRepositoryHandle::Cached(CachedIssuerRepository::new(repo, cache))
        } else {
            IssuerRepositoryHandle::Direct(repo)
        })
    }

    /// Build a `BadgeClass` repository, cache-wrapped iff caching is
    /// enabled. Requires `Ready`.
    pub async fn create_badge_class_repository(&self) -> Result<BadgeClassRepositoryHandle, RepoError> {
        let (backend, cache, cache_enabled) = self.ready_backend().await?;
        let repo = BadgeClassRepository::new(backend);
        Ok(if cache_enabled {
            BadgeClassRepositoryHandle::Cached(CachedBadgeClassRepository::new(repo, cache))
        } else {
            BadgeClassRepositoryHandle::Direct(repo)
        })
    }

    /// Build an `Assertion` repository, cache-wrapped iff caching is
    /// enabled. Requires `Ready`.
    pub async fn create_assertion_repository(&self) -> Result<AssertionRepositoryHandle, RepoError> {
        let (backend, cache, cache_enabled) = self.ready_backend().await?;
        let repo = AssertionRepository::new(backend);
        Ok(if cache_enabled {
            AssertionRepositoryHandle::Cached(CachedAssertionRepository::new(repo, cache))
        } else {
            AssertionRepositoryHandle::Direct(repo)
        })
    }

    /// Build a `StatusList` repository. Never cache-wrapped: status-list
    /// mutations bypass the cache entirely. Requires `Ready`.
    pub async fn create_status_list_repository(&self) -> Result<StatusListRepository, RepoError> {
        let (backend, _cache, _cache_enabled) = self.ready_backend().await?;
        Ok(StatusListRepository::new(backend))
    }

    /// Lightweight connectivity probe (`SELECT 1` or equivalent).
    /// `false` if the factory isn't `Ready`.
    pub async fn is_connected(&self) -> bool {
        let guard = self.inner.lock().await;
        let Some(backend) = guard.backend.clone() else {
            return false;
        };
        drop(guard);
        backend.is_connected().await
    }

    /// Probe the active backend's health, if any.
    pub async fn health(&self) -> Option<BackendHealth> {
        let guard = self.inner.lock().await;
        let backend = guard.backend.clone()?;
        drop(guard);
        Some(backend.health().await)
    }

    /// Wait for any in-flight initialization, release resources, and
    /// return to `Uninitialized`. No-op if already `Uninitialized`,
    /// `Closed`, or `Closing` (another caller is already tearing down).
    #[instrument(level = "debug", skip(self))]
    pub async fn close(&self) {
        let mut backend_to_close = None;
        loop {
            let mut guard = self.inner.lock().await;
            match guard.state {
                FactoryState::Initializing => {
                    drop(guard);
                    self.ready_notify.notified().await;
                }
                FactoryState::Uninitialized | FactoryState::Closed | FactoryState::Closing => return,
                FactoryState::Ready => {
                    guard.state = FactoryState::Closing;
                    backend_to_close = guard.backend.take();
                    guard.cache = None;
                    guard.cache_enabled = false;
                    break;
                }
            }
        }

        if let Some(backend) = backend_to_close {
            backend.close().await;
        }

        let mut guard = self.inner.lock().await;
        guard.state = FactoryState::Uninitialized;
        drop(guard);
        self.ready_notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, DatabaseConfig, DatabaseType, SyncMode};

    fn in_memory_config() -> RepositoryConfig {
        RepositoryConfig {
            database: DatabaseConfig {
                db_type: DatabaseType::Sqlite,
                connection_string: None,
                sqlite_file: Some(":memory:".to_string()),
                sqlite_busy_timeout: 5_000,
                sqlite_sync_mode: SyncMode::Normal,
                sqlite_cache_size: 10_000,
                pool_max: 5,
                idle_timeout_sec: 30,
                connect_timeout_sec: 10,
                max_lifetime_sec: 3_600,
            },
            cache: CacheConfig { enabled: true },
        }
    }

    #[tokio::test]
    async fn repository_creation_requires_ready() {
        let factory = RepositoryFactory::new();
        let err = factory.create_issuer_repository().await.unwrap_err();
        assert!(matches!(err, RepoError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn initialize_then_close_round_trips_state() {
        let factory = RepositoryFactory::new();
        factory.initialize(&in_memory_config()).await.unwrap();
        assert!(factory.is_connected().await);
        factory.close().await;
        let err = factory.create_issuer_repository().await.unwrap_err();
        assert!(matches!(err, RepoError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn reinitialize_while_ready_is_a_warning_not_an_error() {
        let factory = RepositoryFactory::new();
        factory.initialize(&in_memory_config()).await.unwrap();
        factory.initialize(&in_memory_config()).await.unwrap();
        assert!(factory.is_connected().await);
    }
}
