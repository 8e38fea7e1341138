//! Property-based tests for score scales and strategy rules

use moe_router::routing::expert::Expert;
use moe_router::routing::patterns::RoutingThresholds;
use moe_router::routing::scorer::score_all;
use moe_router::routing::strategy::{select, to_confidence, Strategy as DispatchStrategy};
use moe_router::routing::type_override;
use moe_router::routing::weights::{
    apply_learned, apply_utility, description_words, learned_boost, utility_keyword_adjustment,
    LearnedWeights, UtilityWeights,
};
use moe_router::testing::sample_patterns;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn expert_strategy() -> impl Strategy<Value = Expert> {
    prop_oneof![
        Just(Expert::Development),
        Just(Expert::Security),
        Just(Expert::Inventory),
        Just(Expert::Cicd),
    ]
}

proptest! {
    #[test]
    fn keyword_scores_stay_on_scale(description in ".{0,200}") {
        for (_, score) in score_all(&description, &sample_patterns()) {
            prop_assert!(score.score <= 100);
        }
    }

    #[test]
    fn learned_pass_stays_on_scale(
        score in 0u8..=100,
        expert in expert_strategy(),
        preference in -1000.0f64..1000.0,
        keyword_weight in -1000.0f64..1000.0,
    ) {
        let learned = LearnedWeights {
            expert_preference: BTreeMap::from([(expert.clone(), preference)]),
            keyword_weight: BTreeMap::from([("deploy".to_string(), keyword_weight)]),
        };
        let words = description_words("deploy deploy deploy");
        let adjusted = apply_learned(score, &expert, &words, &learned);
        prop_assert!(adjusted <= 100);

        let boost = learned_boost(&expert, &words, &learned);
        prop_assert!((0.0..=10.0).contains(&boost.preference));
        prop_assert!(boost.keyword.abs() <= 15.0);
    }

    #[test]
    fn utility_pass_stays_on_scale(
        score in 0u8..=100,
        expert in expert_strategy(),
        multiplier in 0.0f64..50.0,
        additive in -500.0f64..500.0,
        calibration in 0.0f64..50.0,
    ) {
        let utility = UtilityWeights {
            version: None,
            expert_multiplier: BTreeMap::from([(expert.clone(), multiplier)]),
            keyword_additive: BTreeMap::from([("cve".to_string(), additive)]),
            calibration_factor: BTreeMap::from([(expert.clone(), calibration)]),
        };
        let words = description_words("investigate cve exposure");
        prop_assert!(apply_utility(score, &expert, &words, &utility) <= 100);
    }

    #[test]
    fn margin_of_twenty_points_forces_single_expert(
        primary in 20u8..=100,
        gap in 20u8..=100,
    ) {
        prop_assume!(gap <= primary);
        let runner_up = primary - gap;
        let scores = BTreeMap::from([
            (Expert::Security, primary),
            (Expert::Inventory, runner_up),
        ]);
        let thresholds = RoutingThresholds {
            single_expert: 1.0,
            multi_expert: 0.5,
            minimum_activation: 0.0,
        };

        let selection = select(&scores, &thresholds).unwrap();
        prop_assert_eq!(selection.primary, Expert::Security);
        prop_assert_eq!(selection.strategy, DispatchStrategy::SingleExpert);
    }

    #[test]
    fn confidences_are_unit_interval(
        scores in proptest::collection::btree_map(expert_strategy(), 0u8..=100, 1..4)
    ) {
        let selection = select(&scores, &RoutingThresholds::default()).unwrap();
        let confidence = selection.primary_confidence();
        prop_assert!((0.0..=1.0).contains(&confidence));
        for score in scores.values() {
            prop_assert!((0.0..=1.0).contains(&to_confidence(*score)));
        }
    }

    #[test]
    fn cve_prefix_always_maps_to_security(year in 1999u32..2100, id in 1u32..999_999, rest in "[a-z ]{0,40}") {
        let description = format!("cve-{year}-{id}: {rest}");
        let detected = type_override::detect(&description).unwrap();
        prop_assert_eq!(detected.expert, Expert::Security);
        prop_assert_eq!(detected.normalized_type, "cve");
    }
}

#[test]
fn repeated_keyword_adjustments_are_capped() {
    let description = "deploy ".repeat(100);
    let words = description_words(&description);

    let utility = UtilityWeights {
        keyword_additive: BTreeMap::from([("deploy".to_string(), 3.0)]),
        ..Default::default()
    };
    assert_eq!(utility_keyword_adjustment(&words, &utility), 10.0);

    let negative = UtilityWeights {
        keyword_additive: BTreeMap::from([("deploy".to_string(), -3.0)]),
        ..Default::default()
    };
    assert_eq!(utility_keyword_adjustment(&words, &negative), -10.0);

    let learned = LearnedWeights {
        keyword_weight: BTreeMap::from([("deploy".to_string(), 1.0)]),
        ..Default::default()
    };
    assert_eq!(learned_boost(&Expert::Cicd, &words, &learned).keyword, 15.0);
}

#[test]
fn ties_follow_priority_order() {
    let scores = BTreeMap::from([
        (Expert::Cicd, 60),
        (Expert::Inventory, 60),
        (Expert::Security, 60),
    ]);
    let selection = select(&scores, &RoutingThresholds::default()).unwrap();
    assert_eq!(selection.primary, Expert::Security);
    assert_eq!(selection.strategy, DispatchStrategy::MultiExpertParallel);
    assert_eq!(selection.parallel, vec![Expert::Inventory, Expert::Cicd]);
}
