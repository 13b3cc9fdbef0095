//! End-to-end scenarios exercising the factory, repositories, cache, and
//! status-list engine together against an in-memory SQLite backend.

use openbadges_core::config::{CacheConfig, DatabaseConfig, DatabaseType, RepositoryConfig, SyncMode};
use openbadges_core::convert::{ImageRef, Iri, StatusSize, Timestamp};
use openbadges_core::model::{
    NewAssertion, NewBadgeClass, NewIssuer, Patch, Recipient, StatusPurpose,
};
use openbadges_core::repository::Pagination;
use openbadges_core::RepositoryFactory;
use serde_json::{json, Map};

fn in_memory_config(cache_enabled: bool) -> RepositoryConfig {
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
        cache: CacheConfig { enabled: cache_enabled },
    }
}

fn acme_issuer() -> NewIssuer {
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

fn widget_wrangler(issuer: Iri) -> NewBadgeClass {
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

fn email_assertion(issuer: Iri, badge_class: Iri, identity: &str) -> NewAssertion {
    NewAssertion {
        badge_class,
        issuer,
        recipient: Recipient::Identity {
            type_: "email".to_string(),
            identity: identity.to_string(),
            hashed: false,
            salt: None,
        },
        issued_on: Timestamp::now(),
        expires: None,
        evidence: None,
        verification: None,
        additional_fields: Map::new(),
    }
}

/// Scenario 1: issue and revoke.
#[tokio::test]
async fn issue_and_revoke() {
    let factory = RepositoryFactory::new();
    factory.initialize(&in_memory_config(true)).await.unwrap();

    let issuers = factory.create_issuer_repository().await.unwrap();
    let badge_classes = factory.create_badge_class_repository().await.unwrap();
    let assertions = factory.create_assertion_repository().await.unwrap();
    let status_lists = factory.create_status_list_repository().await.unwrap();

    let issuer = issuers.create(acme_issuer()).await.unwrap();
    let badge_class = badge_classes.create(widget_wrangler(issuer.id.clone())).await.unwrap();
    let assertion = assertions
        .create(email_assertion(issuer.id.clone(), badge_class.id.clone(), "a@b.test"))
        .await
        .unwrap();

    let entry = status_lists
        .allocate_status_position(&issuer.id, &assertion.id, StatusPurpose::Revocation, StatusSize::new(1).unwrap())
        .await
        .unwrap();
    assert_eq!(entry.status_list_index, 0);
    assert_eq!(entry.current_status, 0);

    let status = status_lists.get_status(&assertion.id, StatusPurpose::Revocation).await.unwrap();
    assert_eq!(status, 0);

    let result = status_lists
        .update_credential_status(&assertion.id, StatusPurpose::Revocation, 1, Some("fraud".to_string()))
        .await;
    assert!(result.success);

    let status = status_lists.get_status(&assertion.id, StatusPurpose::Revocation).await.unwrap();
    assert_eq!(status, 1);

    let found_entry = status_lists.find_status_entry(&assertion.id, StatusPurpose::Revocation).await.unwrap().unwrap();
    assert_eq!(found_entry.status_reason.as_deref(), Some("fraud"));

    let stats = status_lists.get_status_list_stats(&entry.status_list_id).await.unwrap();
    assert_eq!(stats.used_entries, 1);
    assert_eq!(stats.counted_entries, 1);

    factory.close().await;
}

/// Scenario 2: bit-packing at a 2-bit boundary.
#[tokio::test]
async fn bit_packing_at_boundary() {
    let factory = RepositoryFactory::new();
    factory.initialize(&in_memory_config(false)).await.unwrap();

    let issuers = factory.create_issuer_repository().await.unwrap();
    let badge_classes = factory.create_badge_class_repository().await.unwrap();
    let assertions = factory.create_assertion_repository().await.unwrap();
    let status_lists = factory.create_status_list_repository().await.unwrap();

    let issuer = issuers.create(acme_issuer()).await.unwrap();
    let badge_class = badge_classes.create(widget_wrangler(issuer.id.clone())).await.unwrap();

    // Allocate indices 0..=3 so the fourth allocation lands at index 3.
    let mut last_entry = None;
    for i in 0..4 {
        let assertion = assertions
            .create(email_assertion(issuer.id.clone(), badge_class.id.clone(), &format!("r{i}@b.test")))
            .await
            .unwrap();
        let entry = status_lists
            .allocate_status_position(&issuer.id, &assertion.id, StatusPurpose::Message, StatusSize::new(2).unwrap())
            .await
            .unwrap();
        assert_eq!(entry.status_list_index, i);
        last_entry = Some((assertion.id, entry));
    }
    let (credential_id, entry) = last_entry.unwrap();
    assert_eq!(entry.status_list_index, 3);

    let result = status_lists.update_credential_status(&credential_id, StatusPurpose::Message, 2, None).await;
    assert!(result.success);

    let stats = status_lists.get_status_list_stats(&entry.status_list_id).await.unwrap();
    assert_eq!(stats.used_entries, 4);

    let value = status_lists.get_status(&credential_id, StatusPurpose::Message).await.unwrap();
    assert_eq!(value, 2);

    factory.close().await;
}

/// Scenario 3: two sequential allocations for a fresh `(issuer, purpose,
/// statusSize)` combination land at distinct, ascending indices — the
/// property the single-shared-transaction design exists to guarantee
/// even when issuance flows race.
#[tokio::test]
async fn sequential_allocation_yields_distinct_indices() {
    let factory = RepositoryFactory::new();
    factory.initialize(&in_memory_config(false)).await.unwrap();

    let issuers = factory.create_issuer_repository().await.unwrap();
    let badge_classes = factory.create_badge_class_repository().await.unwrap();
    let assertions = factory.create_assertion_repository().await.unwrap();
    let status_lists = factory.create_status_list_repository().await.unwrap();

    let issuer = issuers.create(acme_issuer()).await.unwrap();
    let badge_class = badge_classes.create(widget_wrangler(issuer.id.clone())).await.unwrap();

    let first_assertion =
        assertions.create(email_assertion(issuer.id.clone(), badge_class.id.clone(), "one@b.test")).await.unwrap();
    let second_assertion =
        assertions.create(email_assertion(issuer.id.clone(), badge_class.id.clone(), "two@b.test")).await.unwrap();

    let first_entry = status_lists
        .allocate_status_position(&issuer.id, &first_assertion.id, StatusPurpose::Revocation, StatusSize::new(1).unwrap())
        .await
        .unwrap();
    let second_entry = status_lists
        .allocate_status_position(&issuer.id, &second_assertion.id, StatusPurpose::Revocation, StatusSize::new(1).unwrap())
        .await
        .unwrap();

    assert_eq!(first_entry.status_list_id, second_entry.status_list_id);
    assert_ne!(first_entry.status_list_index, second_entry.status_list_index);
    let mut indices = [first_entry.status_list_index, second_entry.status_list_index];
    indices.sort_unstable();
    assert_eq!(indices, [0, 1]);

    factory.close().await;
}

/// Scenario 4: cache invalidation on update.
#[tokio::test]
async fn cache_invalidation_on_update() {
    let factory = RepositoryFactory::new();
    factory.initialize(&in_memory_config(true)).await.unwrap();
    let issuers = factory.create_issuer_repository().await.unwrap();

    let issuer = issuers.create(acme_issuer()).await.unwrap();
    let first_read = issuers.find_by_id(&issuer.id).await.unwrap().unwrap();
    assert_eq!(first_read.name, json!("Acme"));

    issuers
        .update(&issuer.id, openbadges_core::model::IssuerPatch { name: Patch::Set(json!("New")), ..Default::default() })
        .await
        .unwrap();

    let second_read = issuers.find_by_id(&issuer.id).await.unwrap().unwrap();
    assert_eq!(second_read.name, json!("New"));

    factory.close().await;
}

/// Scenario 5: version chain integrity.
#[tokio::test]
async fn version_chain_integrity() {
    let factory = RepositoryFactory::new();
    factory.initialize(&in_memory_config(false)).await.unwrap();
    let issuers = factory.create_issuer_repository().await.unwrap();
    let badge_classes = factory.create_badge_class_repository().await.unwrap();

    let issuer_a = issuers.create(acme_issuer()).await.unwrap();
    let issuer_b = issuers
        .create(NewIssuer { url: Iri::new("https://other.example").unwrap(), ..acme_issuer() })
        .await
        .unwrap();

    let b1 = badge_classes.create(widget_wrangler(issuer_a.id.clone())).await.unwrap();

    let mut b2_new = widget_wrangler(issuer_a.id.clone());
    b2_new.previous_version = Some(b1.id.clone());
    let b2 = badge_classes.create(b2_new).await.unwrap();

    let mut b3_new = widget_wrangler(issuer_b.id.clone());
    b3_new.previous_version = Some(b2.id.clone());
    let err = badge_classes.create(b3_new).await.unwrap_err();
    assert!(matches!(err, openbadges_core::RepoError::Validation(_)));

    factory.close().await;
}

/// Scenario 6: cascade delete.
#[tokio::test]
async fn cascade_delete() {
    let factory = RepositoryFactory::new();
    factory.initialize(&in_memory_config(true)).await.unwrap();
    let issuers = factory.create_issuer_repository().await.unwrap();
    let badge_classes = factory.create_badge_class_repository().await.unwrap();
    let assertions = factory.create_assertion_repository().await.unwrap();

    let issuer = issuers.create(acme_issuer()).await.unwrap();
    let badge_class = badge_classes.create(widget_wrangler(issuer.id.clone())).await.unwrap();
    let assertion =
        assertions.create(email_assertion(issuer.id.clone(), badge_class.id.clone(), "a@b.test")).await.unwrap();

    // Populate caches before the delete so the test also exercises
    // cross-entity cache invalidation, not just the DB cascade.
    badge_classes.find_by_id(&badge_class.id).await.unwrap();
    assertions.find_by_id(&assertion.id).await.unwrap();

    assert!(issuers.delete(&issuer.id).await.unwrap());

    assert!(badge_classes.find_by_id(&badge_class.id).await.unwrap().is_none());
    assert!(assertions.find_by_id(&assertion.id).await.unwrap().is_none());

    factory.close().await;
}

/// Pagination bounds are validated before any backend call.
#[tokio::test]
async fn pagination_bounds_are_enforced() {
    assert!(Pagination::new(0, 0).is_err());
    assert!(Pagination::new(1001, 0).is_err());
    assert!(Pagination::new(10, -1).is_err());
    assert!(Pagination::new(10, 0).is_ok());
}

/// Exceeding a status list's `statusSize` range is rejected before any
/// bitstring mutation is attempted.
#[tokio::test]
async fn status_value_out_of_range_is_rejected() {
    let factory = RepositoryFactory::new();
    factory.initialize(&in_memory_config(false)).await.unwrap();
    let issuers = factory.create_issuer_repository().await.unwrap();
    let badge_classes = factory.create_badge_class_repository().await.unwrap();
    let assertions = factory.create_assertion_repository().await.unwrap();
    let status_lists = factory.create_status_list_repository().await.unwrap();

    let issuer = issuers.create(acme_issuer()).await.unwrap();
    let badge_class = badge_classes.create(widget_wrangler(issuer.id.clone())).await.unwrap();
    let assertion =
        assertions.create(email_assertion(issuer.id.clone(), badge_class.id.clone(), "a@b.test")).await.unwrap();

    status_lists
        .allocate_status_position(&issuer.id, &assertion.id, StatusPurpose::Revocation, StatusSize::new(1).unwrap())
        .await
        .unwrap();

    // statusSize=1 allows only 0 or 1; 2 is out of range.
    let result = status_lists.update_credential_status(&assertion.id, StatusPurpose::Revocation, 2, None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("exceeds max value"));

    factory.close().await;
}

/// `allocateStatusPosition` creates a fresh `StatusList` with the
/// spec-mandated minimum capacity when none is available yet.
#[tokio::test]
async fn allocation_creates_list_with_minimum_capacity_when_none_available() {
    let factory = RepositoryFactory::new();
    factory.initialize(&in_memory_config(false)).await.unwrap();
    let issuers = factory.create_issuer_repository().await.unwrap();
    let badge_classes = factory.create_badge_class_repository().await.unwrap();
    let assertions = factory.create_assertion_repository().await.unwrap();
    let status_lists = factory.create_status_list_repository().await.unwrap();

    let issuer = issuers.create(acme_issuer()).await.unwrap();
    let badge_class = badge_classes.create(widget_wrangler(issuer.id.clone())).await.unwrap();
    let assertion =
        assertions.create(email_assertion(issuer.id.clone(), badge_class.id.clone(), "a@b.test")).await.unwrap();

    assert!(status_lists
        .find_available_status_list(&issuer.id, StatusPurpose::Suspension, StatusSize::new(1).unwrap())
        .await
        .unwrap()
        .is_none());

    let entry = status_lists
        .allocate_status_position(&issuer.id, &assertion.id, StatusPurpose::Suspension, StatusSize::new(1).unwrap())
        .await
        .unwrap();

    let list = status_lists
        .find_available_status_list(&issuer.id, StatusPurpose::Suspension, StatusSize::new(1).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list.id, entry.status_list_id);
    assert_eq!(list.total_entries, openbadges_core::model::MIN_TOTAL_ENTRIES);
    assert_eq!(list.used_entries, 1);

    factory.close().await;
}
