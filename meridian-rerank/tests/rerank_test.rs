//! meridian-rerank integration tests with scripted collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use meridian_core::config::{DecisionConfig, RerankConfig};
use meridian_core::errors::{MeridianError, RerankError, RetrievalError};
use meridian_core::models::{
    ClinicalContext, ComboType, MatchTier, MergedCandidate, PatientProfile, RecommendQuery,
    RetrievalSource, Scenario, SourceScores, SubItem,
};
use meridian_core::traits::{ICompletionProvider, IScenarioStore};

use meridian_rerank::{DecisionEngine, LlmReranker, RerankPipeline, RerankStrategy, TokenEstimator};

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

struct ScriptedCompletion<F>
where
    F: Fn(&str) -> Result<String, RerankError> + Send + Sync,
{
    handler: F,
    calls: AtomicUsize,
}

impl<F> ScriptedCompletion<F>
where
    F: Fn(&str) -> Result<String, RerankError> + Send + Sync,
{
    fn new(handler: F) -> Arc<Self> {
        Arc::new(Self {
            handler,
            calls: AtomicUsize::new(0),
        })
    }
}

impl<F> ICompletionProvider for ScriptedCompletion<F>
where
    F: Fn(&str) -> Result<String, RerankError> + Send + Sync,
{
    fn complete(&self, prompt: &str) -> Result<String, RerankError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.handler)(prompt)
    }
}

struct SubItemStore {
    sub_items: HashMap<u64, Vec<SubItem>>,
}

impl IScenarioStore for SubItemStore {
    fn find_matching(
        &self,
        _keywords: &[String],
        _limit: usize,
    ) -> Result<Vec<Arc<Scenario>>, RetrievalError> {
        Ok(Vec::new())
    }

    fn load_by_id(&self, _id: u64) -> Result<Option<Arc<Scenario>>, RetrievalError> {
        Ok(None)
    }

    fn sub_items_for(
        &self,
        scenario_id: u64,
        top_k: usize,
        min_rating: u8,
    ) -> Result<Vec<SubItem>, RerankError> {
        let mut items: Vec<SubItem> = self
            .sub_items
            .get(&scenario_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|item| item.rating >= min_rating)
            .collect();
        items.sort_by(|a, b| b.rating.cmp(&a.rating));
        items.truncate(top_k);
        Ok(items)
    }
}

fn scenario(id: u64, department: &str) -> Arc<Scenario> {
    Arc::new(Scenario {
        id,
        description: format!("scenario {id}: acute chest pain, initial imaging"),
        department: department.to_string(),
        topic: None,
        age_group: Some("18-65".into()),
        sex: None,
        pregnancy_status: None,
        urgency: None,
        population: None,
    })
}

fn candidate(id: u64, sub_items: Vec<SubItem>) -> MergedCandidate {
    let mut scores = SourceScores::default();
    scores.set(RetrievalSource::Semantic, 0.8);
    scores.set(RetrievalSource::Diversity, 0.7);
    MergedCandidate {
        scenario: scenario(id, "cardiology"),
        scores,
        tier: MatchTier::Pair,
        combo: ComboType::DiversitySemantic,
        final_score: 0.75,
        rule_score: None,
        sub_items,
    }
}

fn items(ratings: &[u8]) -> Vec<SubItem> {
    ratings
        .iter()
        .enumerate()
        .map(|(i, &rating)| SubItem::new(format!("procedure {i}"), rating))
        .collect()
}

fn query() -> RecommendQuery {
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

fn reranker<F>(completion: Arc<ScriptedCompletion<F>>) -> LlmReranker
where
    F: Fn(&str) -> Result<String, RerankError> + Send + Sync + 'static,
{
    LlmReranker::new(
        completion,
        Arc::new(TokenEstimator::default()),
        Arc::new(DecisionEngine::new(DecisionConfig::default())),
        RerankConfig::default(),
    )
}

const SINGLE_GRADING: &str = r#"{
  "recommendation_grades": {"highly_recommended": [1], "recommended": [2], "less_recommended": []},
  "comprehensive_score": 90,
  "scenario_reasoning": "good fit",
  "grading_reasoning": "rating driven",
  "final_choices": ["procedure 0"]
}"#;

// ---------------------------------------------------------------------------
// Single-call path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_call_applies_parsed_grades() {
    let completion = ScriptedCompletion::new(|_prompt: &str| {
        Ok(r#"{
          "selected_scenarios": [{
            "scenario_index": 1,
            "scenario_id": 1,
            "comprehensive_score": 88,
            "scenario_reasoning": "age and department match",
            "grading_reasoning": "CT preferred",
            "recommendation_grades": {"highly_recommended": [1], "recommended": [2], "less_recommended": []},
            "final_choices": ["procedure 0"]
          }],
          "overall_reasoning": "one clear winner"
        }"#
        .to_string())
    });

    let reranker = reranker(Arc::clone(&completion));
    let candidates = vec![
        candidate(1, items(&[8, 5])),
        candidate(2, items(&[6, 6])),
    ];
    let q = query();
    let graded = reranker.grade(&candidates, &q.patient, &q.clinical).await;

    assert_eq!(graded.len(), 2);
    assert_eq!(completion.calls.load(Ordering::SeqCst), 1, "one consolidated call");

    let first = &graded[0];
    assert!(!first.decision.fallback_used);
    assert_eq!(first.decision.comprehensive_score, 88);
    assert_eq!(first.decision.highly_recommended[0].name, "procedure 0");
    assert_eq!(first.decision.final_choices, vec!["procedure 0"]);

    // The scenario the response skipped still gets a complete decision.
    let second = &graded[1];
    assert!(second.decision.fallback_used);
    assert_eq!(second.decision.total_graded(), 2);
}

#[tokio::test]
async fn unparseable_single_call_falls_back_everywhere() {
    let completion = ScriptedCompletion::new(|_prompt: &str| {
        Ok("I cannot produce JSON for this request.".to_string())
    });
    let reranker = reranker(completion);
    let candidates = vec![candidate(1, items(&[9, 5, 2]))];
    let q = query();
    let graded = reranker.grade(&candidates, &q.patient, &q.clinical).await;

    assert_eq!(graded.len(), 1);
    let decision = &graded[0].decision;
    assert!(decision.fallback_used);
    // Rating bands: 9 → highly, 5 → recommended, 2 → less.
    assert_eq!(decision.highly_recommended.len(), 1);
    assert_eq!(decision.recommended.len(), 1);
    assert_eq!(decision.less_recommended.len(), 1);
}

#[tokio::test]
async fn provider_failure_falls_back_and_keeps_going() {
    let completion = ScriptedCompletion::new(|_prompt: &str| {
        Err(RerankError::CompletionFailed {
            reason: "scripted outage".into(),
        })
    });
    let reranker = reranker(completion);
    let candidates = vec![candidate(1, items(&[7]))];
    let q = query();
    let graded = reranker.grade(&candidates, &q.patient, &q.clinical).await;

    assert_eq!(graded.len(), 1);
    assert!(graded[0].decision.fallback_used);
}

// ---------------------------------------------------------------------------
// Fan-out path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fan_out_isolates_per_item_failures() {
    // Nine candidates trip the scenario hard condition, forcing fan-out.
    let completion = ScriptedCompletion::new(|prompt: &str| {
        if prompt.contains("(id 3)") {
            Err(RerankError::CompletionFailed {
                reason: "scripted failure for one item".into(),
            })
        } else {
            Ok(SINGLE_GRADING.to_string())
        }
    });

    let reranker = reranker(Arc::clone(&completion));
    let candidates: Vec<MergedCandidate> =
        (1..=9).map(|id| candidate(id, items(&[8, 5]))).collect();
    let q = query();
    let graded = reranker.grade(&candidates, &q.patient, &q.clinical).await;

    assert_eq!(graded.len(), 9, "every candidate is graded");
    assert_eq!(completion.calls.load(Ordering::SeqCst), 9, "one call per candidate");

    for g in &graded {
        if g.candidate.id() == 3 {
            assert!(g.decision.fallback_used, "failed item falls back");
        } else {
            assert!(!g.decision.fallback_used, "siblings unaffected by the failure");
            assert_eq!(g.decision.comprehensive_score, 90);
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline strategies
// ---------------------------------------------------------------------------

fn pipeline_store() -> Arc<SubItemStore> {
    let mut sub_items = HashMap::new();
    for id in 1..=4u64 {
        sub_items.insert(id, items(&[8, 6, 5]));
    }
    Arc::new(SubItemStore { sub_items })
}

#[tokio::test]
async fn rule_only_strategy_is_deterministic() {
    let completion = ScriptedCompletion::new(|_prompt: &str| {
        panic!("rule-only strategy must not call the completion provider")
    });
    let pipeline = RerankPipeline::new(
        pipeline_store(),
        completion,
        DecisionConfig::default(),
        RerankConfig::default(),
    )
    .unwrap();

    let candidates: Vec<MergedCandidate> = (1..=4).map(|id| candidate(id, Vec::new())).collect();
    let graded = pipeline
        .execute(candidates, &query(), RerankStrategy::RuleOnly)
        .await;

    assert_eq!(graded.len(), 3, "cut to max_scenarios");
    for g in &graded {
        assert!(g.decision.fallback_used);
        assert!(g.candidate.rule_score.is_some());
        assert_eq!(g.decision.total_graded(), 3);
    }
}

#[tokio::test]
async fn hybrid_strategy_puts_llm_picks_first() {
    let completion = ScriptedCompletion::new(|prompt: &str| {
        if prompt.contains("selected_scenario_ids") {
            // Selection call: pick 4 and 2, in that order.
            Ok(r#"{"selected_scenario_ids": [4, 2], "reasoning": "best matches"}"#.to_string())
        } else {
            // Grading call: unparseable, grading falls back to rules.
            Ok("no json here".to_string())
        }
    });
    let pipeline = RerankPipeline::new(
        pipeline_store(),
        completion,
        DecisionConfig::default(),
        RerankConfig::default(),
    )
    .unwrap();

    let candidates: Vec<MergedCandidate> = (1..=4).map(|id| candidate(id, Vec::new())).collect();
    let graded = pipeline
        .execute(candidates, &query(), RerankStrategy::RuleAndLlm)
        .await;

    assert_eq!(graded.len(), 3);
    // Identical ratings → identical comprehensive scores → the stable sort
    // keeps selection order: LLM picks (4, 2) first, rule backfill third.
    let ids: Vec<u64> = graded.iter().map(|g| g.candidate.id()).collect();
    assert_eq!(&ids[..2], &[4, 2]);
    assert!(!ids[2..].contains(&4) && !ids[2..].contains(&2));
}

#[tokio::test]
async fn candidates_without_sub_items_are_dropped() {
    let mut sub_items = HashMap::new();
    sub_items.insert(1u64, items(&[8]));
    // Scenario 2 has no sub-items at all.
    let store = Arc::new(SubItemStore { sub_items });

    let completion = ScriptedCompletion::new(|_prompt: &str| Ok("no json".to_string()));
    let pipeline = RerankPipeline::new(
        store,
        completion,
        DecisionConfig::default(),
        RerankConfig::default(),
    )
    .unwrap();

    let candidates = vec![candidate(1, Vec::new()), candidate(2, Vec::new())];
    let graded = pipeline
        .execute(candidates, &query(), RerankStrategy::None)
        .await;

    assert_eq!(graded.len(), 1);
    assert_eq!(graded[0].candidate.id(), 1);
}

#[tokio::test]
async fn empty_input_returns_empty() {
    let completion = ScriptedCompletion::new(|_prompt: &str| Ok(String::new()));
    let pipeline = RerankPipeline::new(
        pipeline_store(),
        completion,
        DecisionConfig::default(),
        RerankConfig::default(),
    )
    .unwrap();

    let graded = pipeline
        .execute(Vec::new(), &query(), RerankStrategy::RuleAndLlm)
        .await;
    assert!(graded.is_empty());
}

#[test]
fn pipeline_rejects_invalid_config() {
    let completion = ScriptedCompletion::new(|_prompt: &str| Ok(String::new()));
    let bad = RerankConfig {
        max_scenarios: 0,
        ..Default::default()
    };
    let result = RerankPipeline::new(
        pipeline_store(),
        completion,
        DecisionConfig::default(),
        bad,
    );
    assert!(matches!(
        result.err(),
        Some(MeridianError::InvalidInput { field: "max_scenarios", .. })
    ));
}
