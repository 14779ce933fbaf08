//! Diversity retriever: concurrent MMR and hybrid dense+sparse searches
//! merged by identity.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use meridian_core::config::{defaults, RetrievalConfig};
use meridian_core::models::{Candidate, RetrievalSource, Scenario};
use meridian_core::traits::{IEmbeddingProvider, IScenarioStore, IVectorIndex};

use crate::semantic::{affinity_filter, domain_matches};

/// Deterministic default similarity for MMR-only hits, derived from the
/// scenario id. MMR picks are relevance-optimized by construction, so they
/// land in a high band; hashing the id keeps the spread without ambient
/// randomness.
fn default_similarity(id: u64) -> f64 {
    // splitmix64 finalizer.
    let mut z = id.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    let unit = (z >> 11) as f64 / (1u64 << 53) as f64;
    let low = defaults::DEFAULT_MMR_SIMILARITY_LOW;
    let high = defaults::DEFAULT_MMR_SIMILARITY_HIGH;
    low + unit * (high - low)
}

/// Diversity-aware retrieval: a max-marginal-relevance search and a hybrid
/// dense+sparse search run concurrently over the same query embedding, then
/// merge by scenario id. Hybrid distance (converted to similarity) takes
/// precedence; MMR-only hits get the high default band.
pub struct DiversityRetriever {
    embedder: Arc<dyn IEmbeddingProvider>,
    index: Arc<dyn IVectorIndex>,
    store: Arc<dyn IScenarioStore>,
    config: RetrievalConfig,
}

impl DiversityRetriever {
    pub fn new(
        embedder: Arc<dyn IEmbeddingProvider>,
        index: Arc<dyn IVectorIndex>,
        store: Arc<dyn IScenarioStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
            config,
        }
    }

    /// Retrieve up to `top_k` candidates above `threshold`. Never fails.
    pub async fn retrieve(
        &self,
        query_text: &str,
        department: &str,
        top_p: usize,
        top_k: usize,
        threshold: f64,
    ) -> Vec<Candidate> {
        let embedding = {
            let embedder = Arc::clone(&self.embedder);
            let text = query_text.to_string();
            match tokio::task::spawn_blocking(move || embedder.embed(&text)).await {
                Ok(Ok(v)) => v,
                Ok(Err(e)) => {
                    warn!(error = %e, "query embedding failed");
                    return Vec::new();
                }
                Err(e) => {
                    warn!(error = %e, "embedding task panicked");
                    return Vec::new();
                }
            }
        };

        let mmr_k = top_k.saturating_mul(self.config.mmr_fetch_multiplier);
        let mmr_task = {
            let index = Arc::clone(&self.index);
            let store = Arc::clone(&self.store);
            let vector = embedding.clone();
            let department = department.to_string();
            tokio::task::spawn_blocking(move || {
                let ids = index.max_marginal_relevance(&vector, top_p, mmr_k)?;
                let scenarios = resolve_ids(store.as_ref(), &ids);
                Ok::<_, meridian_core::errors::RetrievalError>(affinity_filter(
                    scenarios,
                    top_p,
                    |s: &Arc<Scenario>| domain_matches(&department, s),
                ))
            })
        };

        let hybrid_task = {
            let index = Arc::clone(&self.index);
            let vector = embedding.clone();
            let sparse = query_text.to_string();
            let department = department.to_string();
            let store = Arc::clone(&self.store);
            tokio::task::spawn_blocking(move || {
                let hits = index.hybrid_search(&vector, &sparse, top_k.saturating_mul(2))?;
                let resolved: Vec<(Arc<Scenario>, f64)> = hits
                    .iter()
                    .filter_map(|hit| match store.load_by_id(hit.id) {
                        Ok(Some(s)) => Some((s, hit.score)),
                        Ok(None) => None,
                        Err(e) => {
                            warn!(id = hit.id, error = %e, "hybrid hit load failed, skipping");
                            None
                        }
                    })
                    .collect();
                Ok::<_, meridian_core::errors::RetrievalError>(affinity_filter(
                    resolved,
                    top_k,
                    |(s, _)| domain_matches(&department, s),
                ))
            })
        };

        let (mmr_result, hybrid_result) = tokio::join!(mmr_task, hybrid_task);

        let mmr_scenarios = match mmr_result {
            Ok(Ok(list)) => list,
            Ok(Err(e)) => {
                warn!(error = %e, "MMR search failed");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "MMR task panicked");
                Vec::new()
            }
        };
        let hybrid_hits = match hybrid_result {
            Ok(Ok(list)) => list,
            Ok(Err(e)) => {
                warn!(error = %e, "hybrid search failed");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "hybrid task panicked");
                Vec::new()
            }
        };

        // Merge by id. Hybrid similarity (1 - distance) wins when both
        // searches hit the same scenario.
        let hybrid_scores: HashMap<u64, f64> = hybrid_hits
            .iter()
            .map(|(s, distance)| (s.id, (1.0 - distance).max(0.0)))
            .collect();

        let mut merged: HashMap<u64, Candidate> = HashMap::new();
        for scenario in mmr_scenarios {
            let id = scenario.id;
            let score = hybrid_scores
                .get(&id)
                .copied()
                .unwrap_or_else(|| default_similarity(id));
            merged
                .entry(id)
                .or_insert_with(|| Candidate::new(scenario, RetrievalSource::Diversity, score));
        }
        for (scenario, _) in hybrid_hits {
            let id = scenario.id;
            let score = hybrid_scores[&id];
            merged
                .entry(id)
                .or_insert_with(|| Candidate::new(scenario, RetrievalSource::Diversity, score));
        }

        let mut candidates: Vec<Candidate> = merged
            .into_values()
            .filter(|c| c.scores.diversity.unwrap_or(0.0) >= threshold)
            .collect();
        candidates.sort_by(|a, b| {
            let sa = a.scores.diversity.unwrap_or(0.0);
            let sb = b.scores.diversity.unwrap_or(0.0);
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id().cmp(&b.id()))
        });
        candidates.truncate(top_k);
        candidates
    }
}

fn resolve_ids(store: &dyn IScenarioStore, ids: &[u64]) -> Vec<Arc<Scenario>> {
    ids.iter()
        .filter_map(|id| match store.load_by_id(*id) {
            Ok(Some(s)) => Some(s),
            Ok(None) => None,
            Err(e) => {
                warn!(id, error = %e, "MMR hit load failed, skipping");
                None
            }
        })
        .collect()
}
