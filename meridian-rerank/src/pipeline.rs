//! Rerank pipeline: sub-item attachment, candidate selection per strategy,
//! and grading.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use meridian_core::config::{DecisionConfig, RerankConfig};
use meridian_core::errors::{MeridianError, MeridianResult};
use meridian_core::models::{MergedCandidate, RecommendQuery};
use meridian_core::traits::{ICompletionProvider, IScenarioStore};

use crate::decision::DecisionEngine;
use crate::grading;
use crate::parse;
use crate::prompt;
use crate::reranker::{call_with_timeout, GradedCandidate, LlmReranker};
use crate::rule;
use crate::tokens::TokenEstimator;

/// Extra scenarios' worth of sub-items fetched beyond the final cut, so the
/// selection stage has slack.
const SUB_ITEM_BUFFER_SCENARIOS: usize = 2;
/// Upper bound on sub-items fetched per scenario.
const SUB_ITEM_FETCH_CAP: usize = 50;

/// How the pipeline refines the merged candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RerankStrategy {
    /// No reranking: first candidates in merge order.
    None,
    /// Rule scoring only; deterministic grading.
    RuleOnly,
    /// Completion-based selection and grading.
    LlmOnly,
    /// Completion-based selection blended with rule ranking.
    #[default]
    RuleAndLlm,
}

pub struct RerankPipeline {
    store: Arc<dyn IScenarioStore>,
    completion: Arc<dyn ICompletionProvider>,
    estimator: Arc<TokenEstimator>,
    reranker: LlmReranker,
    config: RerankConfig,
}

impl RerankPipeline {
    pub fn new(
        store: Arc<dyn IScenarioStore>,
        completion: Arc<dyn ICompletionProvider>,
        decision_config: DecisionConfig,
        config: RerankConfig,
    ) -> MeridianResult<Self> {
        validate(&config)?;
        let estimator = Arc::new(TokenEstimator::default());
        let decision = Arc::new(DecisionEngine::new(decision_config));
        let reranker = LlmReranker::new(
            Arc::clone(&completion),
            Arc::clone(&estimator),
            decision,
            config.clone(),
        );
        Ok(Self {
            store,
            completion,
            estimator,
            reranker,
            config,
        })
    }

    /// Refine merged candidates into graded recommendations.
    ///
    /// Always returns a complete result: provider failures degrade to rule
    /// ranking and rule-based grading, never to an error.
    pub async fn execute(
        &self,
        candidates: Vec<MergedCandidate>,
        query: &RecommendQuery,
        strategy: RerankStrategy,
    ) -> Vec<GradedCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let mut candidates = self.attach_sub_items(candidates).await;
        candidates.retain(|c| !c.sub_items.is_empty());
        if candidates.is_empty() {
            warn!("no candidate has sub-items, nothing to grade");
            return Vec::new();
        }

        let top_k = self.config.max_scenarios.min(candidates.len());
        let selected = match strategy {
            RerankStrategy::None => {
                let mut list = candidates;
                list.truncate(top_k);
                list
            }
            RerankStrategy::RuleOnly => {
                let mut list = candidates;
                rule::rank(&mut list, &query.patient, &query.clinical);
                list.truncate(top_k);
                list
            }
            RerankStrategy::LlmOnly => {
                let picked = self.llm_select(&candidates, query, top_k).await;
                if picked.is_empty() {
                    warn!("selection call produced nothing, falling back to rule ranking");
                    let mut list = candidates;
                    rule::rank(&mut list, &query.patient, &query.clinical);
                    list.truncate(top_k);
                    list
                } else {
                    picked
                }
            }
            RerankStrategy::RuleAndLlm => self.hybrid_select(candidates, query, top_k).await,
        };

        let mut graded = match strategy {
            RerankStrategy::None | RerankStrategy::RuleOnly => selected
                .iter()
                .map(|candidate| GradedCandidate {
                    candidate: candidate.clone(),
                    decision: grading::fallback_grade(
                        candidate,
                        &query.patient,
                        self.config.max_sub_items,
                    ),
                })
                .collect(),
            RerankStrategy::LlmOnly | RerankStrategy::RuleAndLlm => {
                self.reranker
                    .grade(&selected, &query.patient, &query.clinical)
                    .await
            }
        };

        graded.sort_by(|a, b| b.decision.comprehensive_score.cmp(&a.decision.comprehensive_score));
        info!(count = graded.len(), ?strategy, "rerank complete");
        graded
    }

    /// Attach sub-items to every candidate under bounded concurrency. A
    /// failed or timed-out lookup yields an empty list for that candidate.
    async fn attach_sub_items(&self, candidates: Vec<MergedCandidate>) -> Vec<MergedCandidate> {
        let per_scenario = self.config.max_sub_items
            * (self.config.max_scenarios + SUB_ITEM_BUFFER_SCENARIOS);
        let fetch_count = per_scenario
            .max(self.config.max_sub_items * 2)
            .min(SUB_ITEM_FETCH_CAP);

        let semaphore = Arc::new(Semaphore::new(self.config.sub_item_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (i, mut candidate) in candidates.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let store = Arc::clone(&self.store);
            let min_rating = self.config.min_rating;
            let timeout_secs = self.config.call_timeout_secs;

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (i, candidate),
                };
                let scenario_id = candidate.id();
                let lookup = tokio::task::spawn_blocking(move || {
                    store.sub_items_for(scenario_id, fetch_count, min_rating)
                });
                let result = tokio::time::timeout(
                    std::time::Duration::from_secs(timeout_secs),
                    lookup,
                )
                .await;

                candidate.sub_items = match result {
                    Ok(Ok(Ok(items))) => items,
                    Ok(Ok(Err(e))) => {
                        warn!(scenario_id, error = %e, "sub-item lookup failed");
                        Vec::new()
                    }
                    Ok(Err(e)) => {
                        warn!(scenario_id, error = %e, "sub-item task failed");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(scenario_id, timeout_secs, "sub-item lookup timed out");
                        Vec::new()
                    }
                };
                (i, candidate)
            });
        }

        let mut indexed: Vec<(usize, MergedCandidate)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(entry) => indexed.push(entry),
                Err(e) => warn!(error = %e, "sub-item attachment task panicked"),
            }
        }
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, c)| c).collect()
    }

    /// Ask the completion provider to pick the best-matching scenario ids.
    /// Returns picks in the provider's order; empty on any failure.
    async fn llm_select(
        &self,
        candidates: &[MergedCandidate],
        query: &RecommendQuery,
        top_k: usize,
    ) -> Vec<MergedCandidate> {
        let selection_prompt = prompt::build_selection_prompt(
            &query.patient,
            &query.clinical,
            candidates,
            top_k,
            &self.estimator,
            self.config.prompt_token_budget,
        );

        let response = match call_with_timeout(
            Arc::clone(&self.completion),
            selection_prompt,
            self.config.call_timeout_secs,
        )
        .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "selection call failed");
                return Vec::new();
            }
        };

        let Some(selection) = parse::parse_selection(&response) else {
            warn!("selection response failed every parse tier");
            return Vec::new();
        };

        let mut picked = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for id in selection.selected_scenario_ids {
            if !seen.insert(id) {
                continue;
            }
            match candidates.iter().find(|c| c.id() == id) {
                Some(candidate) => picked.push(candidate.clone()),
                None => warn!(id, "selected id not among candidates"),
            }
            if picked.len() == top_k {
                break;
            }
        }
        picked
    }

    /// Split the cut between completion selection (upper half) and rule
    /// ranking (lower half); completion picks win deduplication.
    async fn hybrid_select(
        &self,
        candidates: Vec<MergedCandidate>,
        query: &RecommendQuery,
        top_k: usize,
    ) -> Vec<MergedCandidate> {
        let llm_top = top_k.div_ceil(2);

        let (llm_picks, rule_ranked) = tokio::join!(
            self.llm_select(&candidates, query, llm_top),
            async {
                let mut list = candidates.clone();
                rule::rank(&mut list, &query.patient, &query.clinical);
                list
            }
        );

        let mut merged = Vec::with_capacity(top_k);
        let mut seen = std::collections::HashSet::new();
        for candidate in llm_picks {
            if seen.insert(candidate.id()) {
                merged.push(candidate);
            }
        }
        for candidate in rule_ranked {
            if merged.len() >= top_k {
                break;
            }
            if seen.insert(candidate.id()) {
                merged.push(candidate);
            }
        }
        merged
    }
}

fn validate(config: &RerankConfig) -> MeridianResult<()> {
    if config.max_scenarios == 0 {
        return Err(MeridianError::InvalidInput {
            field: "max_scenarios",
            reason: "must be at least 1".into(),
        });
    }
    if config.max_sub_items == 0 {
        return Err(MeridianError::InvalidInput {
            field: "max_sub_items",
            reason: "must be at least 1".into(),
        });
    }
    if config.max_concurrent_calls == 0 {
        return Err(MeridianError::InvalidInput {
            field: "max_concurrent_calls",
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}
