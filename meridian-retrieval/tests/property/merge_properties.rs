//! Property tests for the merge-and-score engine.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use meridian_core::config::TierWeights;
use meridian_core::models::{Candidate, MatchTier, RetrievalSource, Scenario};
use meridian_retrieval::merge::merge_and_score;

fn scenario(id: u64) -> Arc<Scenario> {
    Arc::new(Scenario {
        id,
        description: format!("scenario {id}"),
        department: "cardiology".to_string(),
        topic: None,
        age_group: None,
        sex: None,
        pregnancy_status: None,
        urgency: None,
        population: None,
    })
}

fn candidates(source: RetrievalSource, entries: &[(u64, f64)]) -> Vec<Candidate> {
    entries
        .iter()
        .map(|(id, score)| Candidate::new(scenario(*id), source, *score))
        .collect()
}

fn entry_list() -> impl Strategy<Value = Vec<(u64, f64)>> {
    prop::collection::vec((0u64..30, 0.0f64..1.0), 0..20)
}

proptest! {
    #[test]
    fn result_size_is_min_of_target_and_union(
        keyword in entry_list(),
        semantic in entry_list(),
        diversity in entry_list(),
        target in 0usize..40,
    ) {
        let k = candidates(RetrievalSource::Keyword, &keyword);
        let s = candidates(RetrievalSource::Semantic, &semantic);
        let d = candidates(RetrievalSource::Diversity, &diversity);

        let union: HashSet<u64> = keyword
            .iter()
            .chain(&semantic)
            .chain(&diversity)
            .map(|(id, _)| *id)
            .collect();

        let merged = merge_and_score(&k, &s, &d, &TierWeights::default(), target);
        prop_assert_eq!(merged.len(), target.min(union.len()));
    }

    #[test]
    fn tiers_are_exhaustive_and_disjoint(
        keyword in entry_list(),
        semantic in entry_list(),
        diversity in entry_list(),
    ) {
        let k = candidates(RetrievalSource::Keyword, &keyword);
        let s = candidates(RetrievalSource::Semantic, &semantic);
        let d = candidates(RetrievalSource::Diversity, &diversity);

        // Target large enough that nothing is cut.
        let merged = merge_and_score(&k, &s, &d, &TierWeights::default(), 1000);

        let mut seen = HashSet::new();
        for m in &merged {
            prop_assert!(seen.insert(m.id()), "duplicate id {} in result", m.id());
            let sources = m.scores.source_count();
            prop_assert!((1..=3).contains(&sources), "invalid source count {}", sources);
            let expected = match sources {
                3 => MatchTier::Full,
                2 => MatchTier::Pair,
                _ => MatchTier::Single,
            };
            prop_assert_eq!(m.tier, expected);
        }
    }

    #[test]
    fn tier1_survives_whenever_target_allows(
        keyword in entry_list(),
        semantic in entry_list(),
        diversity in entry_list(),
        target in 1usize..40,
    ) {
        let k = candidates(RetrievalSource::Keyword, &keyword);
        let s = candidates(RetrievalSource::Semantic, &semantic);
        let d = candidates(RetrievalSource::Diversity, &diversity);

        let all = merge_and_score(&k, &s, &d, &TierWeights::default(), 1000);
        let tier1: HashSet<u64> = all
            .iter()
            .filter(|m| m.tier == MatchTier::Full)
            .map(|m| m.id())
            .collect();

        let merged = merge_and_score(&k, &s, &d, &TierWeights::default(), target);
        if target >= tier1.len() {
            let result_ids: HashSet<u64> = merged.iter().map(|m| m.id()).collect();
            prop_assert!(tier1.is_subset(&result_ids));
        }
    }

    #[test]
    fn merge_is_idempotent(
        keyword in entry_list(),
        semantic in entry_list(),
        diversity in entry_list(),
        target in 0usize..40,
    ) {
        let k = candidates(RetrievalSource::Keyword, &keyword);
        let s = candidates(RetrievalSource::Semantic, &semantic);
        let d = candidates(RetrievalSource::Diversity, &diversity);

        let first = merge_and_score(&k, &s, &d, &TierWeights::default(), target);
        let second = merge_and_score(&k, &s, &d, &TierWeights::default(), target);

        let left: Vec<(u64, u64)> = first.iter().map(|m| (m.id(), m.final_score.to_bits())).collect();
        let right: Vec<(u64, u64)> = second.iter().map(|m| (m.id(), m.final_score.to_bits())).collect();
        prop_assert_eq!(left, right);
    }

    #[test]
    fn round_robin_is_fair_on_disjoint_tier3(per_source in 1usize..8) {
        // Three disjoint single-source lists, target = 3 * per_source:
        // every source contributes exactly per_source items.
        let k: Vec<(u64, f64)> = (0..per_source as u64).map(|i| (i, 0.9)).collect();
        let s: Vec<(u64, f64)> = (0..per_source as u64).map(|i| (100 + i, 0.9)).collect();
        let d: Vec<(u64, f64)> = (0..per_source as u64).map(|i| (200 + i, 0.9)).collect();

        let merged = merge_and_score(
            &candidates(RetrievalSource::Keyword, &k),
            &candidates(RetrievalSource::Semantic, &s),
            &candidates(RetrievalSource::Diversity, &d),
            &TierWeights::default(),
            3 * per_source,
        );

        let count = |range: std::ops::Range<u64>| {
            merged.iter().filter(|m| range.contains(&m.id())).count()
        };
        prop_assert_eq!(count(0..100), per_source);
        prop_assert_eq!(count(100..200), per_source);
        prop_assert_eq!(count(200..300), per_source);
    }
}
