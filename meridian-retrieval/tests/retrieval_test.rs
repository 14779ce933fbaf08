//! meridian-retrieval integration tests.

use std::collections::HashMap;
use std::sync::Arc;

use meridian_core::config::RetrievalConfig;
use meridian_core::errors::{MeridianError, RerankError, RetrievalError};
use meridian_core::models::{
    Candidate, ClinicalContext, ComboType, MatchTier, PatientProfile, RecommendQuery,
    RetrievalSource, Scenario, SubItem,
};
use meridian_core::traits::{
    IEmbeddingProvider, IScenarioStore, ITokenizer, IVectorIndex, ScoredId,
};
use meridian_core::vocab::{SimpleTokenizer, TermDictionary};

use meridian_retrieval::merge::merge_and_score;
use meridian_retrieval::{
    DiversityRetriever, KeywordRetriever, RetrievalService, SemanticRetriever,
};

// ---------------------------------------------------------------------------
// Mocks
// ---------------------------------------------------------------------------

fn scenario(id: u64, description: &str, department: &str) -> Arc<Scenario> {
    Arc::new(Scenario {
        id,
        description: description.to_string(),
        department: department.to_string(),
        topic: None,
        age_group: None,
        sex: None,
        pregnancy_status: None,
        urgency: None,
        population: None,
    })
}

#[derive(Default)]
struct MemoryStore {
    scenarios: HashMap<u64, Arc<Scenario>>,
}

impl MemoryStore {
    fn with(scenarios: Vec<Arc<Scenario>>) -> Arc<Self> {
        Arc::new(Self {
            scenarios: scenarios.into_iter().map(|s| (s.id, s)).collect(),
        })
    }
}

impl IScenarioStore for MemoryStore {
    fn find_matching(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Vec<Arc<Scenario>>, RetrievalError> {
        let mut hits: Vec<Arc<Scenario>> = self
            .scenarios
            .values()
            .filter(|s| {
                let description = s.description.to_lowercase();
                keywords.iter().any(|k| description.contains(k.as_str()))
            })
            .cloned()
            .collect();
        hits.sort_by_key(|s| s.id);
        hits.truncate(limit);
        Ok(hits)
    }

    fn load_by_id(&self, id: u64) -> Result<Option<Arc<Scenario>>, RetrievalError> {
        Ok(self.scenarios.get(&id).cloned())
    }

    fn sub_items_for(
        &self,
        _scenario_id: u64,
        _top_k: usize,
        _min_rating: u8,
    ) -> Result<Vec<SubItem>, RerankError> {
        Ok(Vec::new())
    }
}

struct FixedEmbedder;

impl IEmbeddingProvider for FixedEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(vec![0.1; 8])
    }

    fn dimensions(&self) -> usize {
        8
    }
}

struct FailingEmbedder;

impl IEmbeddingProvider for FailingEmbedder {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
        Err(RetrievalError::ProviderUnavailable {
            provider: "test-embedder".into(),
            reason: "scripted failure".into(),
        })
    }

    fn dimensions(&self) -> usize {
        8
    }
}

#[derive(Default)]
struct MemoryIndex {
    neighbors: Vec<ScoredId>,
    mmr: Vec<u64>,
    hybrid: Vec<ScoredId>,
}

impl IVectorIndex for MemoryIndex {
    fn nearest_neighbors(
        &self,
        _vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredId>, RetrievalError> {
        Ok(self.neighbors.iter().take(k).copied().collect())
    }

    fn max_marginal_relevance(
        &self,
        _vector: &[f32],
        _fetch_k: usize,
        k: usize,
    ) -> Result<Vec<u64>, RetrievalError> {
        Ok(self.mmr.iter().take(k).copied().collect())
    }

    fn hybrid_search(
        &self,
        _vector: &[f32],
        _sparse_query: &str,
        k: usize,
    ) -> Result<Vec<ScoredId>, RetrievalError> {
        Ok(self.hybrid.iter().take(k).copied().collect())
    }
}

fn tokenizer() -> Arc<dyn ITokenizer> {
    Arc::new(SimpleTokenizer::new(TermDictionary::new()))
}

fn candidate(id: u64, source: RetrievalSource, score: f64) -> Candidate {
    Candidate::new(scenario(id, "test scenario", "cardiology"), source, score)
}

fn cardiology_query() -> RecommendQuery {
    RecommendQuery {
        patient: PatientProfile {
            age: Some(45),
            sex: Some("M".into()),
            ..Default::default()
        },
        clinical: ClinicalContext {
            department: "Cardiology".into(),
            chief_complaint: "acute chest pain".into(),
            ..Default::default()
        },
    }
}

// ---------------------------------------------------------------------------
// Merge-and-score
// ---------------------------------------------------------------------------

#[test]
fn merge_end_to_end_scenario() {
    // keyword: [A(0.9), B(0.4)]; semantic: [A(0.8), C(0.7)]; diversity: [C(0.85)].
    let a = 1u64;
    let b = 2u64;
    let c = 3u64;
    let keyword = vec![
        candidate(a, RetrievalSource::Keyword, 0.9),
        candidate(b, RetrievalSource::Keyword, 0.4),
    ];
    let semantic = vec![
        candidate(a, RetrievalSource::Semantic, 0.8),
        candidate(c, RetrievalSource::Semantic, 0.7),
    ];
    let diversity = vec![candidate(c, RetrievalSource::Diversity, 0.85)];

    let merged = merge_and_score(
        &keyword,
        &semantic,
        &diversity,
        &Default::default(),
        3,
    );

    let ids: Vec<u64> = merged.iter().map(|m| m.id()).collect();
    assert_eq!(ids, vec![a, c, b]);

    assert_eq!(merged[0].tier, MatchTier::Pair);
    assert_eq!(merged[0].combo, ComboType::KeywordSemantic);
    assert!((merged[0].final_score - (0.4 * 0.9 + 0.6 * 0.8)).abs() < 1e-9);

    assert_eq!(merged[1].tier, MatchTier::Pair);
    assert_eq!(merged[1].combo, ComboType::DiversitySemantic);
    assert!((merged[1].final_score - (0.5 * 0.85 + 0.5 * 0.7)).abs() < 1e-9);

    assert_eq!(merged[2].tier, MatchTier::Single);
    assert_eq!(merged[2].combo, ComboType::KeywordOnly);
    assert!((merged[2].final_score - 0.4).abs() < 1e-9);
}

#[test]
fn tier1_uses_configured_weights() {
    let keyword = vec![candidate(7, RetrievalSource::Keyword, 0.6)];
    let semantic = vec![candidate(7, RetrievalSource::Semantic, 0.9)];
    let diversity = vec![candidate(7, RetrievalSource::Diversity, 0.8)];

    let merged = merge_and_score(&keyword, &semantic, &diversity, &Default::default(), 5);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].tier, MatchTier::Full);
    assert_eq!(merged[0].combo, ComboType::All);
    let expected = 0.2 * 0.6 + 0.5 * 0.9 + 0.3 * 0.8;
    assert!((merged[0].final_score - expected).abs() < 1e-9);
}

#[test]
fn tier1_always_included_when_target_allows() {
    let mut keyword = Vec::new();
    let mut semantic = Vec::new();
    let mut diversity = Vec::new();
    // Two tier-1 candidates with low scores, plus high-scoring tier-3 noise.
    for id in [1, 2] {
        keyword.push(candidate(id, RetrievalSource::Keyword, 0.1));
        semantic.push(candidate(id, RetrievalSource::Semantic, 0.1));
        diversity.push(candidate(id, RetrievalSource::Diversity, 0.1));
    }
    for id in 10..20 {
        semantic.push(candidate(id, RetrievalSource::Semantic, 0.99));
    }

    let merged = merge_and_score(&keyword, &semantic, &diversity, &Default::default(), 5);
    let tier1_ids: Vec<u64> = merged
        .iter()
        .filter(|m| m.tier == MatchTier::Full)
        .map(|m| m.id())
        .collect();
    assert_eq!(tier1_ids, vec![1, 2]);
}

#[test]
fn round_robin_fill_is_fair_across_sources() {
    // Only tier-3 candidates, three per source, target 6 → two from each.
    let keyword: Vec<Candidate> = (0..3)
        .map(|i| candidate(100 + i, RetrievalSource::Keyword, 0.9 - i as f64 * 0.1))
        .collect();
    let semantic: Vec<Candidate> = (0..3)
        .map(|i| candidate(200 + i, RetrievalSource::Semantic, 0.9 - i as f64 * 0.1))
        .collect();
    let diversity: Vec<Candidate> = (0..3)
        .map(|i| candidate(300 + i, RetrievalSource::Diversity, 0.9 - i as f64 * 0.1))
        .collect();

    let merged = merge_and_score(&keyword, &semantic, &diversity, &Default::default(), 6);
    assert_eq!(merged.len(), 6);

    let count = |combo: ComboType| merged.iter().filter(|m| m.combo == combo).count();
    assert_eq!(count(ComboType::SemanticOnly), 2);
    assert_eq!(count(ComboType::DiversityOnly), 2);
    assert_eq!(count(ComboType::KeywordOnly), 2);

    // Priority order within the first round: semantic, diversity, keyword.
    assert_eq!(merged[0].combo, ComboType::SemanticOnly);
    assert_eq!(merged[1].combo, ComboType::DiversityOnly);
    assert_eq!(merged[2].combo, ComboType::KeywordOnly);
}

#[test]
fn merge_is_idempotent() {
    let keyword = vec![
        candidate(1, RetrievalSource::Keyword, 0.5),
        candidate(2, RetrievalSource::Keyword, 0.7),
    ];
    let semantic = vec![
        candidate(2, RetrievalSource::Semantic, 0.6),
        candidate(3, RetrievalSource::Semantic, 0.9),
    ];
    let diversity = vec![candidate(4, RetrievalSource::Diversity, 0.8)];

    let first = merge_and_score(&keyword, &semantic, &diversity, &Default::default(), 10);
    let second = merge_and_score(&keyword, &semantic, &diversity, &Default::default(), 10);

    let left: Vec<(u64, u64)> = first
        .iter()
        .map(|m| (m.id(), m.final_score.to_bits()))
        .collect();
    let right: Vec<(u64, u64)> = second
        .iter()
        .map(|m| (m.id(), m.final_score.to_bits()))
        .collect();
    assert_eq!(left, right);
}

#[test]
fn merge_of_nothing_is_empty() {
    let merged = merge_and_score(&[], &[], &[], &Default::default(), 16);
    assert!(merged.is_empty());
}

#[test]
fn result_never_exceeds_target() {
    let semantic: Vec<Candidate> = (0..40)
        .map(|i| candidate(i, RetrievalSource::Semantic, 0.9))
        .collect();
    let merged = merge_and_score(&[], &semantic, &[], &Default::default(), 16);
    assert_eq!(merged.len(), 16);
}

// ---------------------------------------------------------------------------
// Keyword retriever
// ---------------------------------------------------------------------------

#[test]
fn keyword_retriever_scores_by_overlap() {
    let store = MemoryStore::with(vec![
        scenario(1, "acute chest pain with dyspnea", "cardiology"),
        scenario(2, "chronic knee pain after exercise", "orthopedics"),
        scenario(3, "routine hypertension followup", "cardiology"),
    ]);
    let retriever = KeywordRetriever::new(tokenizer(), store, RetrievalConfig::default());

    let results = retriever.retrieve("acute chest pain", &[], 10, 5);
    assert!(!results.is_empty());
    assert_eq!(results[0].id(), 1, "best overlap should rank first");
    assert!(results
        .iter()
        .all(|c| c.scores.keyword.is_some() && c.scores.semantic.is_none()));
    assert!(!results[0].matched_keywords.is_empty());
}

#[test]
fn keyword_retriever_remaps_weak_batches() {
    let store = MemoryStore::with(vec![
        scenario(1, "chest pain and also many other unrelated words here", "cardiology"),
        scenario(2, "pain in general plus plenty of filler text in description", "cardiology"),
    ]);
    let retriever = KeywordRetriever::new(tokenizer(), store, RetrievalConfig::default());

    let results = retriever.retrieve("chest pain", &[], 10, 5);
    // Raw Jaccard is far below 0.7, so every score must be in the remap band.
    assert!(!results.is_empty());
    for c in &results {
        let score = c.scores.keyword.unwrap();
        assert!((0.5..=0.95).contains(&score), "score {score} out of band");
    }
}

#[test]
fn keyword_retriever_learns_lexicon_terms() {
    let store = MemoryStore::with(vec![scenario(
        1,
        "suspected pulmonary embolism workup",
        "pulmonology",
    )]);
    let tok: Arc<dyn ITokenizer> = Arc::new(SimpleTokenizer::new(TermDictionary::new()));
    let retriever = KeywordRetriever::new(Arc::clone(&tok), store, RetrievalConfig::default());

    retriever.retrieve(
        "rule out pulmonary embolism",
        &["pulmonary embolism".to_string()],
        10,
        5,
    );
    assert!(tok.contains_term("pulmonary embolism"));
}

// ---------------------------------------------------------------------------
// Semantic retriever
// ---------------------------------------------------------------------------

#[test]
fn semantic_retriever_orders_by_similarity() {
    let store = MemoryStore::with(vec![
        scenario(1, "chest pain", "cardiology"),
        scenario(2, "chest pain variant", "cardiology"),
        scenario(3, "palpitations", "cardiology"),
    ]);
    let index = Arc::new(MemoryIndex {
        neighbors: vec![
            ScoredId { id: 3, score: 0.7 },
            ScoredId { id: 1, score: 0.9 },
            ScoredId { id: 2, score: 0.95 },
        ],
        ..Default::default()
    });
    let retriever = SemanticRetriever::new(Arc::new(FixedEmbedder), index, store);

    let results = retriever.retrieve("chest pain", "Cardiology", 3, 2, 0.6);
    let ids: Vec<u64> = results.iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec![2, 1], "top_k by similarity descending");
    assert!(results
        .iter()
        .all(|c| c.scores.semantic.is_some() && c.scores.keyword.is_none()));
}

#[test]
fn semantic_retriever_backfills_when_filter_is_short() {
    let store = MemoryStore::with(vec![
        scenario(1, "chest pain", "cardiology"),
        scenario(2, "flank pain", "urology"),
    ]);
    let index = Arc::new(MemoryIndex {
        neighbors: vec![
            ScoredId { id: 1, score: 0.9 },
            ScoredId { id: 2, score: 0.8 },
        ],
        ..Default::default()
    });
    let retriever = SemanticRetriever::new(Arc::new(FixedEmbedder), index, store);

    let results = retriever.retrieve("pain", "Cardiology", 2, 2, 0.6);
    let ids: Vec<u64> = results.iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec![1, 2], "non-matching row backfills to top_p");
}

#[test]
fn semantic_retriever_drops_below_threshold() {
    let store = MemoryStore::with(vec![
        scenario(1, "chest pain", "cardiology"),
        scenario(2, "palpitations", "cardiology"),
    ]);
    let index = Arc::new(MemoryIndex {
        neighbors: vec![
            ScoredId { id: 1, score: 0.9 },
            ScoredId { id: 2, score: 0.3 },
        ],
        ..Default::default()
    });
    let retriever = SemanticRetriever::new(Arc::new(FixedEmbedder), index, store);

    let results = retriever.retrieve("chest pain", "Cardiology", 10, 10, 0.6);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id(), 1);
}

#[test]
fn semantic_retriever_survives_embedder_failure() {
    let store = MemoryStore::with(vec![scenario(1, "chest pain", "cardiology")]);
    let retriever = SemanticRetriever::new(
        Arc::new(FailingEmbedder),
        Arc::new(MemoryIndex::default()),
        store,
    );
    assert!(retriever.retrieve("chest pain", "Cardiology", 10, 10, 0.6).is_empty());
}

// ---------------------------------------------------------------------------
// Diversity retriever
// ---------------------------------------------------------------------------

#[tokio::test]
async fn diversity_hybrid_score_takes_precedence() {
    let store = MemoryStore::with(vec![
        scenario(1, "chest pain", "cardiology"),
        scenario(2, "palpitations", "cardiology"),
        scenario(3, "syncope", "cardiology"),
    ]);
    let index = Arc::new(MemoryIndex {
        mmr: vec![1, 2],
        hybrid: vec![
            ScoredId { id: 2, score: 0.2 }, // distance → similarity 0.8
            ScoredId { id: 3, score: 0.1 }, // distance → similarity 0.9
        ],
        ..Default::default()
    });
    let retriever = DiversityRetriever::new(
        Arc::new(FixedEmbedder),
        index,
        store,
        RetrievalConfig::default(),
    );

    let results = retriever.retrieve("chest pain", "Cardiology", 10, 10, 0.6).await;
    let by_id: HashMap<u64, f64> = results
        .iter()
        .map(|c| (c.id(), c.scores.diversity.unwrap()))
        .collect();

    assert_eq!(by_id.len(), 3, "union of MMR and hybrid hits");
    assert!((by_id[&2] - 0.8).abs() < 1e-9, "hybrid similarity wins for shared hit");
    assert!((by_id[&3] - 0.9).abs() < 1e-9);
    assert!((0.90..=0.95).contains(&by_id[&1]), "MMR-only hit gets default band");
}

#[tokio::test]
async fn diversity_survives_index_failure() {
    struct BrokenIndex;
    impl IVectorIndex for BrokenIndex {
        fn nearest_neighbors(
            &self,
            _vector: &[f32],
            _k: usize,
        ) -> Result<Vec<ScoredId>, RetrievalError> {
            Err(RetrievalError::IndexQueryFailed {
                reason: "scripted".into(),
            })
        }
        fn max_marginal_relevance(
            &self,
            _vector: &[f32],
            _fetch_k: usize,
            _k: usize,
        ) -> Result<Vec<u64>, RetrievalError> {
            Err(RetrievalError::IndexQueryFailed {
                reason: "scripted".into(),
            })
        }
        fn hybrid_search(
            &self,
            _vector: &[f32],
            _sparse_query: &str,
            _k: usize,
        ) -> Result<Vec<ScoredId>, RetrievalError> {
            Err(RetrievalError::IndexQueryFailed {
                reason: "scripted".into(),
            })
        }
    }

    let store = MemoryStore::with(vec![scenario(1, "chest pain", "cardiology")]);
    let retriever = DiversityRetriever::new(
        Arc::new(FixedEmbedder),
        Arc::new(BrokenIndex),
        store,
        RetrievalConfig::default(),
    );
    let results = retriever.retrieve("chest pain", "Cardiology", 10, 10, 0.6).await;
    assert!(results.is_empty());
}

// ---------------------------------------------------------------------------
// Retrieval service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn service_isolates_failed_retrievers() {
    // Embedder fails → semantic and diversity contribute nothing, keyword
    // still carries the request.
    let store = MemoryStore::with(vec![scenario(
        1,
        "acute chest pain with radiation to left arm",
        "cardiology",
    )]);
    let config = RetrievalConfig {
        similarity_threshold: 0.0,
        ..Default::default()
    };
    let service = RetrievalService::new(
        tokenizer(),
        Arc::new(FailingEmbedder),
        Arc::new(MemoryIndex::default()),
        store,
        config,
    )
    .unwrap();

    let results = service.retrieve(&cardiology_query(), &[]).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|m| m.combo == ComboType::KeywordOnly));
}

#[tokio::test]
async fn service_returns_empty_when_everything_fails() {
    let service = RetrievalService::new(
        tokenizer(),
        Arc::new(FailingEmbedder),
        Arc::new(MemoryIndex::default()),
        Arc::new(MemoryStore::default()),
        RetrievalConfig::default(),
    )
    .unwrap();

    let results = service.retrieve(&cardiology_query(), &[]).await.unwrap();
    assert!(results.is_empty(), "exhausted retrieval is Ok(empty), not an error");
}

#[test]
fn service_rejects_invalid_config() {
    let bad = RetrievalConfig {
        top_k: 0,
        ..Default::default()
    };
    let err = RetrievalService::new(
        tokenizer(),
        Arc::new(FixedEmbedder),
        Arc::new(MemoryIndex::default()),
        Arc::new(MemoryStore::default()),
        bad,
    )
    .err()
    .expect("top_k = 0 must be rejected");
    assert!(matches!(err, MeridianError::InvalidInput { field: "top_k", .. }));

    let bad = RetrievalConfig {
        similarity_threshold: 1.5,
        ..Default::default()
    };
    assert!(RetrievalService::new(
        tokenizer(),
        Arc::new(FixedEmbedder),
        Arc::new(MemoryIndex::default()),
        Arc::new(MemoryStore::default()),
        bad,
    )
    .is_err());
}
