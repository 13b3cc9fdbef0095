use crate::cache::store::CacheStore;
use crate::convert::Iri;
use crate::model::{Assertion, BadgeClass, Issuer};

/// Backing storage for every key family, shared by the three cache
/// decorators so cross-entity invalidation (an `Issuer` delete reaching
/// its `BadgeClass`es and `Assertion`s) doesn't need its own wiring
/// between decorator instances — they all hold the same
/// `Arc<CacheRegistry>`.
pub(crate) struct CacheRegistry {
    pub(crate) issuer_by_id: CacheStore<Iri, Issuer>,
    pub(crate) badge_class_by_id: CacheStore<Iri, BadgeClass>,
    /// Keyed by `"{issuerId}|{limit}|{offset}"`: pagination is part of
    /// the list-result shape, so it is folded into the key rather than
    /// tracked separately. Writes clear this family wholesale rather
    /// than targeting one page, since a write can invalidate more than
    /// one cached page at once.
    pub(crate) badge_classes_by_issuer: CacheStore<String, Vec<BadgeClass>>,
    pub(crate) assertion_by_id: CacheStore<Iri, Assertion>,
    /// Keyed by `"{badgeClassId}|{limit}|{offset}"`, same rationale.
    pub(crate) assertions_by_badge_class: CacheStore<String, Vec<Assertion>>,
    /// Keyed by `"{recipientIdentity}|{limit}|{offset}"`.
    pub(crate) assertions_by_recipient: CacheStore<String, Vec<Assertion>>,
}

impl CacheRegistry {
    pub(crate) fn new() -> Self {
        Self {
            issuer_by_id: CacheStore::new(),
            badge_class_by_id: CacheStore::new(),
            badge_classes_by_issuer: CacheStore::new(),
            assertion_by_id: CacheStore::new(),
            assertions_by_badge_class: CacheStore::new(),
            assertions_by_recipient: CacheStore::new(),
        }
    }

    /// Cascade invalidation for deleting an `Issuer`: its own key plus
    /// every `BadgeClass`/`Assertion` key family that could hold one of
    /// its descendants, flushed conservatively rather than tracked
    /// precisely.
    pub(crate) async fn invalidate_issuer_cascade(&self, issuer_id: &Iri) {
        self.issuer_by_id.invalidate(issuer_id).await;
        // Keyed per-page ("{issuerId}|{limit}|{offset}"), so a targeted
        // invalidate can't address every cached page; clear the family.
        self.badge_classes_by_issuer.clear().await;
        self.badge_class_by_id.clear().await;
        self.assertion_by_id.clear().await;
        self.assertions_by_badge_class.clear().await;
        self.assertions_by_recipient.clear().await;
    }

    /// Cascade invalidation for deleting a `BadgeClass`: its own key,
    /// its issuer's list family, and every `Assertion` key family that
    /// could hold one of its descendants.
    pub(crate) async fn invalidate_badge_class_cascade(&self, badge_class_id: &Iri) {
        self.badge_class_by_id.invalidate(badge_class_id).await;
        // Both families are keyed per-page, so a bare id can't target the
        // right entries; clear wholesale like the issuer cascade does.
        self.badge_classes_by_issuer.clear().await;
        self.assertions_by_badge_class.clear().await;
        self.assertion_by_id.clear().await;
        self.assertions_by_recipient.clear().await;
    }
}
