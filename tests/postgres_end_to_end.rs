//! The same end-to-end shape as `end_to_end.rs`, run against a real
//! Postgres instance instead of in-memory SQLite. Requires a running
//! Postgres reachable at `DATABASE_URL` (or `postgres://postgres@localhost/openbadges_test`
//! by default); ignored by default since CI doesn't provision one.

use std::env;

use openbadges_core::config::{CacheConfig, DatabaseConfig, DatabaseType, RepositoryConfig, SyncMode};
use openbadges_core::convert::{Iri, StatusSize};
use openbadges_core::model::StatusPurpose;
use openbadges_core::RepositoryFactory;
use serde_json::{json, Map};

fn postgres_config() -> RepositoryConfig {
    let connection_string = env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/openbadges_test".to_string());
    RepositoryConfig {
        database: DatabaseConfig {
            db_type: DatabaseType::Postgresql,
            connection_string: Some(connection_string),
            sqlite_file: None,
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
#[ignore = "requires a running Postgres instance; see DATABASE_URL"]
async fn issue_and_revoke_against_postgres() {
    let factory = RepositoryFactory::new();
    factory.initialize(&postgres_config()).await.unwrap();

    let issuers = factory.create_issuer_repository().await.unwrap();
    let badge_classes = factory.create_badge_class_repository().await.unwrap();
    let assertions = factory.create_assertion_repository().await.unwrap();
    let status_lists = factory.create_status_list_repository().await.unwrap();

    let issuer = issuers
        .create(openbadges_core::model::NewIssuer {
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

    let badge_class = badge_classes
        .create(openbadges_core::model::NewBadgeClass {
            issuer: issuer.id.clone(),
            name: json!("Widget Wrangler"),
            description: "Shipped a widget".to_string(),
            image: openbadges_core::convert::ImageRef::Iri(
                Iri::new("https://acme.example/badge.png").unwrap(),
            ),
            criteria: json!({"narrative": "ship widget"}),
            alignment: None,
            tags: None,
            version: None,
            previous_version: None,
            related: None,
            endorsement: None,
            additional_fields: Map::new(),
        })
        .await
        .unwrap();

    let assertion = assertions
        .create(openbadges_core::model::NewAssertion {
            badge_class: badge_class.id.clone(),
            issuer: issuer.id.clone(),
            recipient: openbadges_core::model::Recipient::Identity {
                type_: "email".to_string(),
                identity: "learner@example.com".to_string(),
                hashed: false,
                salt: None,
            },
            issued_on: openbadges_core::convert::Timestamp::now(),
            expires: None,
            evidence: None,
            verification: None,
            additional_fields: Map::new(),
        })
        .await
        .unwrap();

    status_lists
        .allocate_status_position(
            &issuer.id,
            &assertion.id,
            StatusPurpose::Revocation,
            StatusSize::new(1).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        status_lists.get_status(&assertion.id, StatusPurpose::Revocation).await.unwrap(),
        0
    );

    let result = status_lists
        .update_credential_status(&assertion.id, StatusPurpose::Revocation, 1, Some("fraud".to_string()))
        .await;
    assert!(result.success);
    assert_eq!(
        status_lists.get_status(&assertion.id, StatusPurpose::Revocation).await.unwrap(),
        1
    );

    factory.close().await;
}
