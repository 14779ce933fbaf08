//! Property tests for the adaptive decision engine.

use std::sync::Arc;

use proptest::prelude::*;

use meridian_core::config::{DecisionConfig, Environment};
use meridian_core::models::{
    ComboType, MatchTier, MergedCandidate, Scenario, SourceScores, StrategyKind, SubItem,
};
use meridian_rerank::DecisionEngine;

fn candidate(id: u64, sub_items: usize) -> MergedCandidate {
    MergedCandidate {
        scenario: Arc::new(Scenario {
            id,
            description: format!("scenario {id}"),
            department: "cardiology".into(),
            topic: None,
            age_group: None,
            sex: None,
            pregnancy_status: None,
            urgency: None,
            population: None,
        }),
        scores: SourceScores::default(),
        tier: MatchTier::Single,
        combo: ComboType::SemanticOnly,
        final_score: 0.5,
        rule_score: None,
        sub_items: (0..sub_items)
            .map(|i| SubItem::new(format!("procedure {i}"), 7))
            .collect(),
    }
}

fn batch(counts: &[usize]) -> Vec<MergedCandidate> {
    counts
        .iter()
        .enumerate()
        .map(|(i, &n)| candidate(i as u64, n))
        .collect()
}

proptest! {
    #[test]
    fn more_tokens_never_flip_concurrent_back_to_single(
        counts in prop::collection::vec(0usize..12, 1..10),
        base_tokens in 0usize..6_000,
        increment in 1usize..6_000,
    ) {
        let engine = DecisionEngine::new(DecisionConfig {
            learning: false,
            ..Default::default()
        });
        let candidates = batch(&counts);

        let (low, _) = engine.should_use_concurrent(&candidates, base_tokens);
        let (high, _) = engine.should_use_concurrent(&candidates, base_tokens + increment);
        prop_assert!(!(low && !high), "decision flipped back to single as tokens grew");
    }

    #[test]
    fn learned_threshold_stays_clamped(
        outcomes in prop::collection::vec(
            (0u64..500, any::<bool>(), any::<bool>()),
            1..200,
        ),
    ) {
        let engine = DecisionEngine::new(DecisionConfig {
            learning: true,
            environment: Environment::Production,
            ..Default::default()
        });
        let candidates = batch(&[3, 3]);
        let (_, metrics) = engine.should_use_concurrent(&candidates, 1_000);

        for (duration, success, concurrent) in outcomes {
            let strategy = if concurrent {
                StrategyKind::Concurrent
            } else {
                StrategyKind::Single
            };
            engine.record_outcome(metrics.clone(), duration, success, strategy);
            let threshold = engine.token_threshold();
            prop_assert!((2_000..=8_000).contains(&threshold), "threshold {threshold} escaped clamp");
        }
    }

    #[test]
    fn history_never_exceeds_capacity(extra in 0usize..300) {
        let engine = DecisionEngine::new(DecisionConfig {
            learning: true,
            ..Default::default()
        });
        let candidates = batch(&[1]);
        let (_, metrics) = engine.should_use_concurrent(&candidates, 100);

        for _ in 0..(100 + extra) {
            engine.record_outcome(metrics.clone(), 10, true, StrategyKind::Single);
        }
        prop_assert!(engine.history_len() <= 100);
    }

    #[test]
    fn metrics_ratios_are_consistent(
        counts in prop::collection::vec(0usize..12, 1..10),
        tokens in 0usize..20_000,
    ) {
        let engine = DecisionEngine::new(DecisionConfig {
            learning: false,
            ..Default::default()
        });
        let candidates = batch(&counts);
        let (_, metrics) = engine.should_use_concurrent(&candidates, tokens);

        let expected_total: usize = counts.iter().sum();
        prop_assert_eq!(metrics.candidate_count, counts.len());
        prop_assert_eq!(metrics.total_sub_items, expected_total);

        let recomputed = 0.5 * metrics.token_ratio
            + 0.2 * metrics.scenario_ratio
            + 0.2 * metrics.total_ratio
            + 0.1 * metrics.avg_ratio;
        prop_assert!((metrics.composite_score - recomputed).abs() < 1e-9);

        // The decision agrees with the published rule.
        let expect_concurrent =
            metrics.composite_score > 1.0 || !metrics.hard_conditions.is_empty();
        prop_assert_eq!(
            metrics.strategy == StrategyKind::Concurrent,
            expect_concurrent
        );
    }
}
