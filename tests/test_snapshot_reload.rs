//! Hot reload of the pattern, weight and catalog stores


use moe_router::protocol::Task;
use moe_router::routing::{CallerIdentity, Expert, ExpertRouter, Router};
use moe_router::RouterError;
use test_helpers::StoreFixture;

const WIDGET_PATTERNS: &str = r#"{
  "experts": {
    "development": {"activation_keywords": ["implement"]},
    "security": {"activation_keywords": ["widget"], "confidence_boosters": ["inspect"]}
  }
}"#;

async fn route(router: &ExpertRouter, description: &str) -> moe_router::RoutingDecision {
    router
        .route(&Task::new("reload-1", description), &CallerIdentity::local())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_reload_swaps_pattern_store() {
    let fixture = StoreFixture::new();
    let router = ExpertRouter::from_config(&fixture.config()).unwrap();

    let before = route(&router, "inspect the widget").await;
    assert_eq!(before.primary_expert, Expert::Development);
    assert_eq!(before.primary_confidence, 0.0);

    fixture.write_patterns(WIDGET_PATTERNS);
    router.reload().unwrap();

    let after = route(&router, "inspect the widget").await;
    assert_eq!(after.primary_expert, Expert::Security);
    assert_eq!(after.primary_confidence, 0.37);
    assert!(!after.scores.contains_key(&Expert::Inventory));
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_snapshot() {
    let fixture = StoreFixture::new();
    fixture.write_patterns(WIDGET_PATTERNS);
    let router = ExpertRouter::from_config(&fixture.config()).unwrap();
    let loaded_at = router.snapshots().current().loaded_at;

    fixture.write_patterns("{ this is not json");
    assert!(router.reload().is_err());
    assert_eq!(router.snapshots().current().loaded_at, loaded_at);

    std::fs::remove_file(fixture.patterns_path()).unwrap();
    assert!(matches!(
        router.reload(),
        Err(RouterError::ConfigMissing { .. })
    ));

    let decision = route(&router, "inspect the widget").await;
    assert_eq!(decision.primary_expert, Expert::Security);
}

#[tokio::test]
async fn test_reload_picks_up_newer_utility_snapshot() {
    let fixture = StoreFixture::new();
    fixture.write_patterns(WIDGET_PATTERNS);
    fixture.write_utility("20260101_000000", r#"{"confidence_calibration": {"security": 0.5}}"#);
    let router = ExpertRouter::from_config(&fixture.config()).unwrap();

    let first = route(&router, "inspect the widget").await;
    assert_eq!(first.scores[&Expert::Security], 0.19);

    fixture.write_utility("20260301_120000", r#"{"confidence_calibration": {"security": 2.0}}"#);
    router.reload().unwrap();

    let snapshot = router.snapshots().current();
    assert_eq!(snapshot.utility.version.as_deref(), Some("20260301_120000"));

    let second = route(&router, "inspect the widget").await;
    assert_eq!(second.scores[&Expert::Security], 0.74);
}

#[tokio::test]
async fn test_in_memory_store_reload_is_noop() {
    let router = ExpertRouter::new(moe_router::routing::SnapshotStore::new(
        moe_router::testing::sample_snapshot(),
    ));
    assert!(router.snapshots().sources().is_none());
    assert!(router.reload().is_ok());
}
