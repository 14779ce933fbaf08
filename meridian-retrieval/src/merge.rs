//! Tiered merge-and-score across the three retrieval sources.
//!
//! Candidates are deduplicated by scenario id, classified by how many
//! sources returned them, scored with tier-specific weights, and selected
//! tier-by-tier up to the target count. The whole pass is a pure function of
//! its inputs: identical input lists produce an identical ordered result.

use std::collections::HashMap;

use tracing::debug;

use meridian_core::config::TierWeights;
use meridian_core::models::{
    Candidate, ComboType, MatchTier, MergedCandidate, RetrievalSource, SourceScores,
};

// Tier-2 combo weights (first source / second source).
const WEIGHT_KEYWORD_SEMANTIC: (f64, f64) = (0.4, 0.6);
const WEIGHT_KEYWORD_DIVERSITY: (f64, f64) = (0.4, 0.6);
const WEIGHT_DIVERSITY_SEMANTIC: (f64, f64) = (0.5, 0.5);

/// Merge the three candidate lists into a tiered, scored, deduplicated
/// result capped at `target_count`.
///
/// Fill policy: all of tier 1; then all of tier 2 (globally sorted); then
/// tier 3 in round-robin priority semantic → diversity → keyword, popping
/// the current best of each non-empty source in turn. The round-robin keeps
/// provenance diversity in the tail instead of exhausting one source first.
pub fn merge_and_score(
    keyword: &[Candidate],
    semantic: &[Candidate],
    diversity: &[Candidate],
    weights: &TierWeights,
    target_count: usize,
) -> Vec<MergedCandidate> {
    let keyword_by_id = index_by_id(keyword);
    let semantic_by_id = index_by_id(semantic);
    let diversity_by_id = index_by_id(diversity);

    let mut ids: Vec<u64> = keyword_by_id
        .keys()
        .chain(semantic_by_id.keys())
        .chain(diversity_by_id.keys())
        .copied()
        .collect();
    ids.sort_unstable();
    ids.dedup();

    let mut tier1: Vec<MergedCandidate> = Vec::new();
    let mut tier2: Vec<MergedCandidate> = Vec::new();
    let mut tier3_keyword: Vec<MergedCandidate> = Vec::new();
    let mut tier3_semantic: Vec<MergedCandidate> = Vec::new();
    let mut tier3_diversity: Vec<MergedCandidate> = Vec::new();

    for id in ids {
        let from_keyword = keyword_by_id.get(&id).copied();
        let from_semantic = semantic_by_id.get(&id).copied();
        let from_diversity = diversity_by_id.get(&id).copied();

        let mut scores = SourceScores::default();
        for candidate in [from_keyword, from_semantic, from_diversity]
            .into_iter()
            .flatten()
        {
            scores.union(&candidate.scores);
        }

        // A merged candidate with no source is a bug in this function, not a
        // runtime condition.
        debug_assert!(scores.source_count() >= 1, "merged candidate without source");

        let scenario = from_semantic
            .or(from_diversity)
            .or(from_keyword)
            .map(|c| c.scenario.clone())
            .expect("id came from one of the three indexes");

        let k = scores.keyword;
        let s = scores.semantic;
        let d = scores.diversity;

        let (tier, combo, final_score) = match (k, s, d) {
            (Some(k), Some(s), Some(d)) => (
                MatchTier::Full,
                ComboType::All,
                weights.keyword * k + weights.semantic * s + weights.diversity * d,
            ),
            (Some(k), Some(s), None) => (
                MatchTier::Pair,
                ComboType::KeywordSemantic,
                WEIGHT_KEYWORD_SEMANTIC.0 * k + WEIGHT_KEYWORD_SEMANTIC.1 * s,
            ),
            (Some(k), None, Some(d)) => (
                MatchTier::Pair,
                ComboType::KeywordDiversity,
                WEIGHT_KEYWORD_DIVERSITY.0 * k + WEIGHT_KEYWORD_DIVERSITY.1 * d,
            ),
            (None, Some(s), Some(d)) => (
                MatchTier::Pair,
                ComboType::DiversitySemantic,
                WEIGHT_DIVERSITY_SEMANTIC.0 * d + WEIGHT_DIVERSITY_SEMANTIC.1 * s,
            ),
            (Some(k), None, None) => (MatchTier::Single, ComboType::KeywordOnly, k),
            (None, Some(s), None) => (MatchTier::Single, ComboType::SemanticOnly, s),
            (None, None, Some(d)) => (MatchTier::Single, ComboType::DiversityOnly, d),
            (None, None, None) => continue,
        };

        let merged = MergedCandidate {
            scenario,
            scores,
            tier,
            combo,
            final_score,
            rule_score: None,
            sub_items: Vec::new(),
        };

        match (tier, combo) {
            (MatchTier::Full, _) => tier1.push(merged),
            (MatchTier::Pair, _) => tier2.push(merged),
            (MatchTier::Single, ComboType::KeywordOnly) => tier3_keyword.push(merged),
            (MatchTier::Single, ComboType::SemanticOnly) => tier3_semantic.push(merged),
            (MatchTier::Single, _) => tier3_diversity.push(merged),
        }
    }

    sort_by_score(&mut tier1);
    sort_by_score(&mut tier2);
    sort_by_score(&mut tier3_keyword);
    sort_by_score(&mut tier3_semantic);
    sort_by_score(&mut tier3_diversity);

    debug!(
        tier1 = tier1.len(),
        tier2 = tier2.len(),
        tier3_semantic = tier3_semantic.len(),
        tier3_diversity = tier3_diversity.len(),
        tier3_keyword = tier3_keyword.len(),
        "merge tier distribution"
    );

    let mut result = tier1;
    if result.len() < target_count {
        result.append(&mut tier2);
    }
    if result.len() < target_count {
        let needed = target_count - result.len();
        result.extend(round_robin_fill(
            tier3_semantic,
            tier3_diversity,
            tier3_keyword,
            needed,
        ));
    }
    result.truncate(target_count);
    result
}

/// Pop the current best of each non-empty tier-3 source in priority order
/// (semantic → diversity → keyword) until `needed` items are taken or all
/// three run dry.
fn round_robin_fill(
    semantic: Vec<MergedCandidate>,
    diversity: Vec<MergedCandidate>,
    keyword: Vec<MergedCandidate>,
    needed: usize,
) -> Vec<MergedCandidate> {
    let mut selected = Vec::with_capacity(needed);
    let mut queues = [
        semantic.into_iter(),
        diversity.into_iter(),
        keyword.into_iter(),
    ];

    let mut remaining = needed;
    while remaining > 0 {
        let mut took_any = false;
        for queue in queues.iter_mut() {
            if remaining == 0 {
                break;
            }
            if let Some(candidate) = queue.next() {
                selected.push(candidate);
                remaining -= 1;
                took_any = true;
            }
        }
        if !took_any {
            break;
        }
    }
    selected
}

fn index_by_id<'a>(candidates: &'a [Candidate]) -> HashMap<u64, &'a Candidate> {
    let mut map = HashMap::with_capacity(candidates.len());
    for candidate in candidates {
        // Lists arrive best-first; keep the first (highest) entry per id.
        map.entry(candidate.id()).or_insert(candidate);
    }
    map
}

fn sort_by_score(candidates: &mut [MergedCandidate]) {
    candidates.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id().cmp(&b.id()))
    });
}
