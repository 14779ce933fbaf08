//! Semantic retriever: query embedding → ANN search → domain affinity.

use std::sync::Arc;

use tracing::{debug, warn};

use meridian_core::aliases;
use meridian_core::models::{Candidate, RetrievalSource, Scenario};
use meridian_core::traits::{IEmbeddingProvider, IScenarioStore, IVectorIndex, ScoredId};

/// Whether a scenario's domain tag matches the query department.
pub(crate) fn domain_matches(department: &str, scenario: &Scenario) -> bool {
    if department.is_empty() {
        return true;
    }
    aliases::department_table().match_score(department, &scenario.department) >= 1.0
}

/// Keep domain-matching entries; backfill with next-best non-matching ones
/// up to `target`. An empty filtered set falls back to the full input.
pub(crate) fn affinity_filter<T>(
    entries: Vec<T>,
    target: usize,
    matches: impl Fn(&T) -> bool,
) -> Vec<T> {
    if entries.is_empty() {
        return entries;
    }
    // Input arrives best-first, so partition keeps "next-best" order intact.
    let (mut kept, mut rest): (Vec<T>, Vec<T>) = entries.into_iter().partition(|e| matches(e));

    if kept.len() < target && !rest.is_empty() {
        let needed = (target - kept.len()).min(rest.len());
        debug!(
            kept = kept.len(),
            backfilled = needed,
            "domain filter short of target, backfilling"
        );
        kept.extend(rest.drain(..needed));
    }

    if kept.is_empty() {
        warn!("domain filter removed every candidate, keeping unfiltered set");
        return rest;
    }
    kept
}

/// Semantic retrieval via approximate nearest neighbors.
pub struct SemanticRetriever {
    embedder: Arc<dyn IEmbeddingProvider>,
    index: Arc<dyn IVectorIndex>,
    store: Arc<dyn IScenarioStore>,
}

impl SemanticRetriever {
    pub fn new(
        embedder: Arc<dyn IEmbeddingProvider>,
        index: Arc<dyn IVectorIndex>,
        store: Arc<dyn IScenarioStore>,
    ) -> Self {
        Self {
            embedder,
            index,
            store,
        }
    }

    /// Retrieve up to `top_k` candidates above `threshold`. Never fails.
    pub fn retrieve(
        &self,
        query_text: &str,
        department: &str,
        top_p: usize,
        top_k: usize,
        threshold: f64,
    ) -> Vec<Candidate> {
        let embedding = match self.embedder.embed(query_text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed");
                return Vec::new();
            }
        };

        let neighbors = match self.index.nearest_neighbors(&embedding, top_p) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "nearest-neighbor search failed");
                return Vec::new();
            }
        };

        let resolved = self.resolve(neighbors);
        let filtered = affinity_filter(resolved, top_p, |(scenario, _)| {
            domain_matches(department, scenario)
        });

        let mut candidates: Vec<Candidate> = filtered
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .map(|(scenario, score)| Candidate::new(scenario, RetrievalSource::Semantic, score))
            .collect();

        candidates.sort_by(|a, b| {
            let sa = a.scores.semantic.unwrap_or(0.0);
            let sb = b.scores.semantic.unwrap_or(0.0);
            sb.partial_cmp(&sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id().cmp(&b.id()))
        });
        candidates.truncate(top_k);
        candidates
    }

    /// Resolve index hits to scenario rows, preserving hit order. Missing
    /// rows are skipped with a warning; a stale index entry is not fatal.
    fn resolve(&self, hits: Vec<ScoredId>) -> Vec<(Arc<Scenario>, f64)> {
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.store.load_by_id(hit.id) {
                Ok(Some(scenario)) => out.push((scenario, hit.score)),
                Ok(None) => warn!(id = hit.id, "index hit has no scenario row, skipping"),
                Err(e) => warn!(id = hit.id, error = %e, "scenario load failed, skipping"),
            }
        }
        out
    }
}
