//! Concurrent retrieval orchestration.

use std::sync::Arc;

use tracing::{error, info, warn};

use meridian_core::config::RetrievalConfig;
use meridian_core::errors::{MeridianError, MeridianResult};
use meridian_core::models::{Candidate, MergedCandidate, RecommendQuery};
use meridian_core::traits::{IEmbeddingProvider, IScenarioStore, ITokenizer, IVectorIndex};

use crate::diversity::DiversityRetriever;
use crate::keyword::KeywordRetriever;
use crate::merge::merge_and_score;
use crate::semantic::SemanticRetriever;

/// Runs the three candidate retrievers concurrently and merges their output.
///
/// Failure isolation is per retriever: a failed or panicked retriever
/// contributes an empty list and the request continues. All three empty is a
/// valid business outcome ("no matches"), not an error.
pub struct RetrievalService {
    keyword: Arc<KeywordRetriever>,
    semantic: Arc<SemanticRetriever>,
    diversity: DiversityRetriever,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(
        tokenizer: Arc<dyn ITokenizer>,
        embedder: Arc<dyn IEmbeddingProvider>,
        index: Arc<dyn IVectorIndex>,
        store: Arc<dyn IScenarioStore>,
        config: RetrievalConfig,
    ) -> MeridianResult<Self> {
        validate(&config)?;
        Ok(Self {
            keyword: Arc::new(KeywordRetriever::new(
                tokenizer,
                Arc::clone(&store),
                config.clone(),
            )),
            semantic: Arc::new(SemanticRetriever::new(
                Arc::clone(&embedder),
                Arc::clone(&index),
                Arc::clone(&store),
            )),
            diversity: DiversityRetriever::new(embedder, index, store, config.clone()),
            config,
        })
    }

    /// Retrieve, merge, and threshold-filter candidates for a query.
    ///
    /// `lexicon` carries caller-supplied domain terms folded into the
    /// tokenizer dictionary before keyword extraction.
    pub async fn retrieve(
        &self,
        query: &RecommendQuery,
        lexicon: &[String],
    ) -> MeridianResult<Vec<MergedCandidate>> {
        let text = query.standardized_text();
        let department = query.clinical.department.clone();
        let RetrievalConfig {
            top_p,
            top_k,
            similarity_threshold,
            ..
        } = self.config;

        let keyword_task = {
            let retriever = Arc::clone(&self.keyword);
            let text = text.clone();
            let lexicon = lexicon.to_vec();
            tokio::task::spawn_blocking(move || retriever.retrieve(&text, &lexicon, top_p, top_k))
        };
        let semantic_task = {
            let retriever = Arc::clone(&self.semantic);
            let text = text.clone();
            let department = department.clone();
            tokio::task::spawn_blocking(move || {
                retriever.retrieve(&text, &department, top_p, top_k, similarity_threshold)
            })
        };
        let diversity_future =
            self.diversity
                .retrieve(&text, &department, top_p, top_k, similarity_threshold);

        let (keyword_result, semantic_result, diversity_candidates) =
            tokio::join!(keyword_task, semantic_task, diversity_future);

        let keyword_candidates = unwrap_task(keyword_result, "keyword");
        let semantic_candidates = unwrap_task(semantic_result, "semantic");

        info!(
            keyword = keyword_candidates.len(),
            semantic = semantic_candidates.len(),
            diversity = diversity_candidates.len(),
            "retrieval complete"
        );

        if keyword_candidates.is_empty()
            && semantic_candidates.is_empty()
            && diversity_candidates.is_empty()
        {
            warn!("all three retrievers returned empty");
            return Ok(Vec::new());
        }

        let merged = merge_and_score(
            &keyword_candidates,
            &semantic_candidates,
            &diversity_candidates,
            &self.config.tier_weights,
            top_k,
        );

        let filtered: Vec<MergedCandidate> = merged
            .into_iter()
            .filter(|m| m.final_score >= similarity_threshold)
            .collect();
        Ok(filtered)
    }
}

fn unwrap_task(
    result: Result<Vec<Candidate>, tokio::task::JoinError>,
    name: &str,
) -> Vec<Candidate> {
    match result {
        Ok(candidates) => candidates,
        Err(e) => {
            error!(retriever = name, error = %e, "retriever task failed");
            Vec::new()
        }
    }
}

fn validate(config: &RetrievalConfig) -> MeridianResult<()> {
    if config.top_k == 0 {
        return Err(MeridianError::InvalidInput {
            field: "top_k",
            reason: "must be at least 1".into(),
        });
    }
    if config.top_p < config.top_k {
        return Err(MeridianError::InvalidInput {
            field: "top_p",
            reason: format!(
                "must be at least top_k ({} < {})",
                config.top_p, config.top_k
            ),
        });
    }
    if !(0.0..=1.0).contains(&config.similarity_threshold) {
        return Err(MeridianError::InvalidInput {
            field: "similarity_threshold",
            reason: format!("{} outside [0, 1]", config.similarity_threshold),
        });
    }
    Ok(())
}
