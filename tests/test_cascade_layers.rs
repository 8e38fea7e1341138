//! External classifier layers wired through configuration
//!
//! HTTP layers run against wiremock; a layer that is down, slow or returns
//! garbage must never keep the router from producing a decision.


use moe_router::config::{ClassifierEndpoint, CicdPlacement};
use moe_router::protocol::{RoutingMethod, Task};
use moe_router::routing::{CallerIdentity, Expert, ExpertRouter, Router};
use serde_json::json;
use std::time::Duration;
use test_helpers::StoreFixture;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http(server: &MockServer, route: &str, timeout_ms: u64) -> ClassifierEndpoint {
    ClassifierEndpoint::Http {
        url: format!("{}{route}", server.uri()),
        timeout_ms,
        retry_attempts: 0,
    }
}

async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn route(router: &ExpertRouter, description: &str) -> moe_router::RoutingDecision {
    router
        .route(&Task::new("cascade-1", description), &CallerIdentity::local())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_nlp_layer_decides() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/nlp",
        ResponseTemplate::new(200).set_body_json(json!({
            "expert": "security",
            "confidence": 0.88,
            "method": "hybrid",
            "matched_keywords": ["leak"]
        })),
    )
    .await;

    let fixture = StoreFixture::new();
    let mut config = fixture.config();
    config.classifiers.nlp = Some(http(&server, "/nlp", 2000));
    let router = ExpertRouter::from_config(&config).unwrap();

    let decision = route(&router, "someone leaked the thing").await;

    assert_eq!(decision.primary_expert, Expert::Security);
    assert_eq!(decision.primary_confidence, 0.88);
    assert_eq!(decision.routing_method, RoutingMethod::NlpHybrid);
    assert!(decision.explanation.contains("keywords: leak"));
    assert!(decision.explanation.ends_with("[via nlp-hybrid]"));
}

#[tokio::test]
async fn test_low_nlp_confidence_falls_to_semantic() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/nlp",
        ResponseTemplate::new(200).set_body_json(json!({"expert": "security", "confidence": 0.5})),
    )
    .await;
    mount(
        &server,
        "/semantic",
        ResponseTemplate::new(200).set_body_json(json!({
            "expert": "inventory",
            "confidence": 0.64,
            "method": "semantic"
        })),
    )
    .await;

    let fixture = StoreFixture::new();
    let mut config = fixture.config();
    config.classifiers.nlp = Some(http(&server, "/nlp", 2000));
    config.classifiers.semantic = Some(http(&server, "/semantic", 2000));
    let router = ExpertRouter::from_config(&config).unwrap();

    let decision = route(&router, "which machines are out there").await;

    assert_eq!(decision.primary_expert, Expert::Inventory);
    assert_eq!(decision.routing_method, RoutingMethod::Semantic);
}

#[tokio::test]
async fn test_semantic_answer_without_method_falls_to_keywords() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/semantic",
        ResponseTemplate::new(200).set_body_json(json!({"expert": "inventory", "confidence": 0.9})),
    )
    .await;

    let fixture = StoreFixture::new();
    let mut config = fixture.config();
    config.classifiers.semantic = Some(http(&server, "/semantic", 2000));
    let router = ExpertRouter::from_config(&config).unwrap();

    let decision = route(&router, "What time is it?").await;
    assert_eq!(decision.primary_expert, Expert::Development);
    assert_eq!(decision.primary_confidence, 0.0);
    assert_eq!(decision.routing_method, RoutingMethod::Keyword);
}

#[tokio::test]
async fn test_failing_layers_fall_back_to_keywords() {
    let server = MockServer::start().await;
    mount(&server, "/nlp", ResponseTemplate::new(500)).await;
    mount(
        &server,
        "/semantic",
        ResponseTemplate::new(200).set_body_string("definitely not json"),
    )
    .await;

    let fixture = StoreFixture::new();
    let mut config = fixture.config();
    config.classifiers.nlp = Some(http(&server, "/nlp", 2000));
    config.classifiers.semantic = Some(http(&server, "/semantic", 2000));
    let router = ExpertRouter::from_config(&config).unwrap();

    let decision = route(&router, "list inventory of servers").await;

    assert_eq!(decision.primary_expert, Expert::Inventory);
    assert_eq!(decision.routing_method, RoutingMethod::Keyword);
}

#[tokio::test]
async fn test_slow_layer_is_skipped() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/nlp",
        ResponseTemplate::new(200)
            .set_body_json(json!({"expert": "security", "confidence": 0.99}))
            .set_delay(Duration::from_millis(500)),
    )
    .await;

    let fixture = StoreFixture::new();
    let mut config = fixture.config();
    config.classifiers.nlp = Some(http(&server, "/nlp", 50));
    let router = ExpertRouter::from_config(&config).unwrap();

    let decision = route(&router, "list inventory of servers").await;
    assert_eq!(decision.primary_expert, Expert::Inventory);
    assert_eq!(decision.routing_method, RoutingMethod::Keyword);
}

#[tokio::test]
async fn test_cicd_fold_is_configurable() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/nlp",
        ResponseTemplate::new(200).set_body_json(json!({"expert": "cicd", "confidence": 0.9})),
    )
    .await;

    let fixture = StoreFixture::new();
    let mut config = fixture.config();
    config.classifiers.nlp = Some(http(&server, "/nlp", 2000));

    let folded = ExpertRouter::from_config(&config).unwrap();
    let decision = route(&folded, "ship it").await;
    assert_eq!(decision.primary_expert, Expert::Development);
    assert_eq!(decision.primary_confidence, 0.9);

    config.routing.cicd_placement = CicdPlacement::Dedicated;
    let dedicated = ExpertRouter::from_config(&config).unwrap();
    let decision = route(&dedicated, "ship it").await;
    assert_eq!(decision.primary_expert, Expert::Cicd);
}

#[tokio::test]
async fn test_type_prefix_beats_qualifying_layer() {
    let server = MockServer::start().await;
    mount(
        &server,
        "/nlp",
        ResponseTemplate::new(200).set_body_json(json!({"expert": "development", "confidence": 0.8})),
    )
    .await;

    let fixture = StoreFixture::new();
    let mut config = fixture.config();
    config.classifiers.nlp = Some(http(&server, "/nlp", 2000));
    let router = ExpertRouter::from_config(&config).unwrap();

    let decision = route(&router, "cve-2023-44487: assess impact").await;

    assert_eq!(decision.primary_expert, Expert::Security);
    assert_eq!(decision.primary_confidence, 0.95);
    assert_eq!(decision.scores[&Expert::Development], 0.8);
    assert_eq!(decision.routing_method, RoutingMethod::TypeClassification);
}
