//! Completion-backed reranker: single consolidated call or bounded fan-out,
//! chosen by the decision engine, with per-unit fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, warn};

use meridian_core::config::RerankConfig;
use meridian_core::errors::RerankError;
use meridian_core::models::{
    ClinicalContext, GradeDecision, MergedCandidate, PatientProfile, StrategyKind,
};
use meridian_core::traits::ICompletionProvider;

use crate::decision::DecisionEngine;
use crate::grading;
use crate::parse;
use crate::prompt::{self, PromptContext};
use crate::tokens::TokenEstimator;

/// A candidate together with its grading decision.
#[derive(Debug, Clone)]
pub struct GradedCandidate {
    pub candidate: MergedCandidate,
    pub decision: GradeDecision,
}

pub struct LlmReranker {
    completion: Arc<dyn ICompletionProvider>,
    estimator: Arc<TokenEstimator>,
    decision: Arc<DecisionEngine>,
    config: RerankConfig,
}

impl LlmReranker {
    pub fn new(
        completion: Arc<dyn ICompletionProvider>,
        estimator: Arc<TokenEstimator>,
        decision: Arc<DecisionEngine>,
        config: RerankConfig,
    ) -> Self {
        Self {
            completion,
            estimator,
            decision,
            config,
        }
    }

    /// Grade every candidate. A completion failure on any path degrades to
    /// the rule-based fallback for the affected candidates; the decision
    /// engine records the outcome either way.
    pub async fn grade(
        &self,
        candidates: &[MergedCandidate],
        patient: &PatientProfile,
        clinical: &ClinicalContext,
    ) -> Vec<GradedCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let context = PromptContext {
            patient,
            clinical,
            candidates,
            max_sub_items: self.config.max_sub_items,
        };
        let batch_prompt =
            prompt::build_batch_prompt(&context, &self.estimator, self.config.prompt_token_budget);
        let estimated_tokens = self.estimator.count_cached(&batch_prompt);

        let (use_concurrent, metrics) = self
            .decision
            .should_use_concurrent(candidates, estimated_tokens);

        let started = Instant::now();
        let (results, success, strategy_used) = if use_concurrent {
            let results = self.grade_concurrent(candidates, patient, clinical).await;
            (results, true, StrategyKind::Concurrent)
        } else {
            match self.grade_single(candidates, patient, &batch_prompt).await {
                Ok(results) => (results, true, StrategyKind::Single),
                Err(e) => {
                    error!(error = %e, "single-call grading failed, using rule fallback");
                    (fallback_all(candidates, patient, self.config.max_sub_items), false, StrategyKind::Single)
                }
            }
        };

        self.decision.record_outcome(
            metrics,
            started.elapsed().as_millis() as u64,
            success,
            strategy_used,
        );
        results
    }

    /// One consolidated completion call over the whole batch.
    async fn grade_single(
        &self,
        candidates: &[MergedCandidate],
        patient: &PatientProfile,
        batch_prompt: &str,
    ) -> Result<Vec<GradedCandidate>, RerankError> {
        let response = self.call_completion(batch_prompt.to_string()).await?;

        let Some(parsed) = parse::parse_grading(&response) else {
            warn!("response failed every parse tier, using rule fallback");
            return Ok(fallback_all(candidates, patient, self.config.max_sub_items));
        };

        let mut decisions: HashMap<usize, GradeDecision> = HashMap::new();
        for selected in &parsed.selected_scenarios {
            let index = selected.scenario_index;
            if index < 1 || index > candidates.len() {
                warn!(index, "scenario index out of range, skipping");
                continue;
            }
            let candidate = &candidates[index - 1];
            let mut decision = grading::apply_buckets(
                candidate,
                &selected.recommendation_grades,
                self.config.max_sub_items,
            );
            decision.scenario_reasoning = selected.scenario_reasoning.clone();
            decision.grading_reasoning = selected.grading_reasoning.clone();
            decision.comprehensive_score =
                selected.comprehensive_score.clamp(0.0, 100.0).round() as u32;
            if !selected.final_choices.is_empty() {
                decision.final_choices = selected
                    .final_choices
                    .iter()
                    .take(self.config.max_sub_items)
                    .cloned()
                    .collect();
            }
            decisions.insert(index - 1, decision);
        }

        // Candidates the response skipped still get a complete decision.
        let results = candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| GradedCandidate {
                candidate: candidate.clone(),
                decision: decisions.remove(&i).unwrap_or_else(|| {
                    grading::fallback_grade(candidate, patient, self.config.max_sub_items)
                }),
            })
            .collect();
        Ok(results)
    }

    /// Bounded-concurrency fan-out: one completion call per candidate, each
    /// independently timeout-bounded and independently falling back. One
    /// item's failure never cancels its siblings.
    async fn grade_concurrent(
        &self,
        candidates: &[MergedCandidate],
        patient: &PatientProfile,
        clinical: &ClinicalContext,
    ) -> Vec<GradedCandidate> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_calls.max(1)));
        let mut join_set = JoinSet::new();

        for (i, candidate) in candidates.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let completion = Arc::clone(&self.completion);
            let candidate = candidate.clone();
            let patient = patient.clone();
            let clinical = clinical.clone();
            let max_sub_items = self.config.max_sub_items;
            let timeout_secs = self.config.call_timeout_secs;

            join_set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        // Semaphore closed only on shutdown; fall back.
                        let decision =
                            grading::fallback_grade(&candidate, &patient, max_sub_items);
                        return (i, candidate, decision);
                    }
                };

                let item_prompt = prompt::build_single_prompt(
                    &patient,
                    &clinical,
                    &candidate,
                    i + 1,
                    max_sub_items,
                );
                let response =
                    call_with_timeout(completion, item_prompt, timeout_secs).await;

                let decision = match response {
                    Ok(text) => match parse::parse_single_grading(&text) {
                        Some(grading) => {
                            grading::from_single_grading(&candidate, &grading, max_sub_items)
                        }
                        None => {
                            warn!(scenario = candidate.id(), "unparseable item response, using rule fallback");
                            grading::fallback_grade(&candidate, &patient, max_sub_items)
                        }
                    },
                    Err(e) => {
                        warn!(scenario = candidate.id(), error = %e, "item call failed, using rule fallback");
                        grading::fallback_grade(&candidate, &patient, max_sub_items)
                    }
                };
                (i, candidate, decision)
            });
        }

        let mut indexed: Vec<(usize, GradedCandidate)> = Vec::with_capacity(candidates.len());
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((i, candidate, decision)) => {
                    indexed.push((i, GradedCandidate { candidate, decision }));
                }
                Err(e) => error!(error = %e, "grading task panicked"),
            }
        }
        indexed.sort_by_key(|(i, _)| *i);
        indexed.into_iter().map(|(_, graded)| graded).collect()
    }

    async fn call_completion(&self, prompt_text: String) -> Result<String, RerankError> {
        call_with_timeout(
            Arc::clone(&self.completion),
            prompt_text,
            self.config.call_timeout_secs,
        )
        .await
    }
}

/// Run a completion call on a blocking task under a hard deadline. A timeout
/// is indistinguishable from a provider error to the caller.
pub(crate) async fn call_with_timeout(
    completion: Arc<dyn ICompletionProvider>,
    prompt_text: String,
    timeout_secs: u64,
) -> Result<String, RerankError> {
    let call = tokio::task::spawn_blocking(move || completion.complete(&prompt_text));
    match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
        Err(_) => Err(RerankError::Timeout { timeout_secs }),
        Ok(Err(join_error)) => Err(RerankError::CompletionFailed {
            reason: format!("completion task failed: {join_error}"),
        }),
        Ok(Ok(result)) => result,
    }
}

fn fallback_all(
    candidates: &[MergedCandidate],
    patient: &PatientProfile,
    max_sub_items: usize,
) -> Vec<GradedCandidate> {
    candidates
        .iter()
        .map(|candidate| GradedCandidate {
            candidate: candidate.clone(),
            decision: grading::fallback_grade(candidate, patient, max_sub_items),
        })
        .collect()
}
