use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::RwLock;

/// A generic in-process read-through cache keyed by `K`, holding cloned
/// values of `V`. Used for both single-entity key families
/// (`issuer:{id}`) and list-result key families
/// (`badgeClasses:byIssuer:{issuerId}`); the key shape is the only
/// difference, so one store type serves both.
///
/// Reads may observe a brief window where a just-invalidated key
/// triggers a refetch from the backend — that race is expected and
/// benign, since the backend is always the authority.
pub(crate) struct CacheStore<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub(crate) fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    pub(crate) async fn get(&self, key: &K) -> Option<V> {
        self.entries.read().await.get(key).cloned()
    }

    pub(crate) async fn insert(&self, key: K, value: V) {
        self.entries.write().await.insert(key, value);
    }

    pub(crate) async fn invalidate(&self, key: &K) {
        self.entries.write().await.remove(key);
    }

    /// Conservatively drop every entry in this family. Used for
    /// cascade invalidation (e.g. an `Issuer` delete reaching every
    /// `BadgeClass`/`Assertion` key it could have touched) where tracking
    /// the exact reachable subset isn't worth the bookkeeping.
    pub(crate) async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_then_insert_then_hit() {
        let store: CacheStore<String, i32> = CacheStore::new();
        assert_eq!(store.get(&"a".to_string()).await, None);
        store.insert("a".to_string(), 1).await;
        assert_eq!(store.get(&"a".to_string()).await, Some(1));
    }

    #[tokio::test]
    async fn invalidate_removes_single_key() {
        let store: CacheStore<String, i32> = CacheStore::new();
        store.insert("a".to_string(), 1).await;
        store.insert("b".to_string(), 2).await;
        store.invalidate(&"a".to_string()).await;
        assert_eq!(store.get(&"a".to_string()).await, None);
        assert_eq!(store.get(&"b".to_string()).await, Some(2));
    }

    #[tokio::test]
    async fn clear_removes_every_key() {
        let store: CacheStore<String, i32> = CacheStore::new();
        store.insert("a".to_string(), 1).await;
        store.insert("b".to_string(), 2).await;
        store.clear().await;
        assert_eq!(store.get(&"a".to_string()).await, None);
        assert_eq!(store.get(&"b".to_string()).await, None);
    }
}
