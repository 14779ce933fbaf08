use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::scenario::{Scenario, SubItem};

/// The three independent retrieval strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    Keyword,
    Semantic,
    Diversity,
}

/// Per-source score map. At most one entry per source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SourceScores {
    pub keyword: Option<f64>,
    pub semantic: Option<f64>,
    pub diversity: Option<f64>,
}

impl SourceScores {
    pub fn single(source: RetrievalSource, score: f64) -> Self {
        let mut scores = Self::default();
        scores.set(source, score);
        scores
    }

    pub fn get(&self, source: RetrievalSource) -> Option<f64> {
        match source {
            RetrievalSource::Keyword => self.keyword,
            RetrievalSource::Semantic => self.semantic,
            RetrievalSource::Diversity => self.diversity,
        }
    }

    pub fn set(&mut self, source: RetrievalSource, score: f64) {
        match source {
            RetrievalSource::Keyword => self.keyword = Some(score),
            RetrievalSource::Semantic => self.semantic = Some(score),
            RetrievalSource::Diversity => self.diversity = Some(score),
        }
    }

    /// Merge another score map in. Existing entries win: a candidate already
    /// scored by a source keeps that source's score.
    pub fn union(&mut self, other: &SourceScores) {
        self.keyword = self.keyword.or(other.keyword);
        self.semantic = self.semantic.or(other.semantic);
        self.diversity = self.diversity.or(other.diversity);
    }

    /// Sources that scored this candidate.
    pub fn sources(&self) -> Vec<RetrievalSource> {
        let mut out = Vec::with_capacity(3);
        if self.keyword.is_some() {
            out.push(RetrievalSource::Keyword);
        }
        if self.semantic.is_some() {
            out.push(RetrievalSource::Semantic);
        }
        if self.diversity.is_some() {
            out.push(RetrievalSource::Diversity);
        }
        out
    }

    pub fn source_count(&self) -> usize {
        self.keyword.is_some() as usize
            + self.semantic.is_some() as usize
            + self.diversity.is_some() as usize
    }
}

/// A retrieved item with per-source scores, before merge.
///
/// Identity is the scenario id, stable across all three retrievers for the
/// same underlying item.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub scenario: Arc<Scenario>,
    pub scores: SourceScores,
    /// Query keywords that matched, for keyword-sourced candidates.
    pub matched_keywords: Vec<String>,
}

impl Candidate {
    pub fn new(scenario: Arc<Scenario>, source: RetrievalSource, score: f64) -> Self {
        Self {
            scenario,
            scores: SourceScores::single(source, score),
            matched_keywords: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.scenario.id
    }
}

/// Match tier: how many of the three retrieval sources returned the
/// candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchTier {
    /// All three sources hit (tier 1).
    Full,
    /// Exactly two sources hit (tier 2).
    Pair,
    /// Exactly one source hit (tier 3).
    Single,
}

impl MatchTier {
    /// Numeric tier, 1 = strongest.
    pub fn rank(self) -> u8 {
        match self {
            MatchTier::Full => 1,
            MatchTier::Pair => 2,
            MatchTier::Single => 3,
        }
    }
}

/// Which source combination produced a candidate. Relevant at tiers 2 and 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComboType {
    All,
    KeywordSemantic,
    KeywordDiversity,
    DiversitySemantic,
    KeywordOnly,
    SemanticOnly,
    DiversityOnly,
}

/// A deduplicated candidate annotated with match tier and final score.
///
/// Created once per merge pass; immutable afterwards except for downstream
/// annotation (rule score, attached sub-items).
#[derive(Debug, Clone)]
pub struct MergedCandidate {
    pub scenario: Arc<Scenario>,
    pub scores: SourceScores,
    pub tier: MatchTier,
    pub combo: ComboType,
    /// Tier-specific weighted combination of the source scores.
    pub final_score: f64,
    /// Rule-ranker annotation, set by the scenario/rule ranker.
    pub rule_score: Option<f64>,
    /// Sub-items attached for reranking.
    pub sub_items: Vec<SubItem>,
}

impl MergedCandidate {
    pub fn id(&self) -> u64 {
        self.scenario.id
    }
}
