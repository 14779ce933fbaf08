//! Keyword retriever: tokenize → fuzzy corpus scan → token-set overlap.

use std::collections::HashSet;
use std::sync::Arc;

use moka::sync::Cache;
use tracing::{debug, warn};

use meridian_core::config::RetrievalConfig;
use meridian_core::models::{Candidate, RetrievalSource};
use meridian_core::traits::{IScenarioStore, ITokenizer};

use crate::normalize;

/// Keyword retrieval over the scenario corpus.
///
/// Scores by Jaccard overlap between the query keyword set and each
/// candidate's keyword set. Extraction results are cached by content hash so
/// repeated queries skip tokenization entirely.
pub struct KeywordRetriever {
    tokenizer: Arc<dyn ITokenizer>,
    store: Arc<dyn IScenarioStore>,
    keyword_cache: Cache<String, Arc<Vec<String>>>,
    config: RetrievalConfig,
}

impl KeywordRetriever {
    pub fn new(
        tokenizer: Arc<dyn ITokenizer>,
        store: Arc<dyn IScenarioStore>,
        config: RetrievalConfig,
    ) -> Self {
        let keyword_cache = Cache::new(config.keyword_cache_size);
        Self {
            tokenizer,
            store,
            keyword_cache,
            config,
        }
    }

    /// Retrieve up to `top_k` candidates. Never fails: a provider error logs
    /// and yields an empty list.
    pub fn retrieve(
        &self,
        query_text: &str,
        lexicon: &[String],
        top_p: usize,
        top_k: usize,
    ) -> Vec<Candidate> {
        let keywords = self.extract_keywords(query_text, lexicon);
        if keywords.is_empty() {
            debug!("no keywords extracted, skipping keyword retrieval");
            return Vec::new();
        }

        let scenarios = match self.store.find_matching(&keywords, top_p) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "keyword corpus scan failed");
                return Vec::new();
            }
        };
        if scenarios.is_empty() {
            return Vec::new();
        }

        let query_set: HashSet<&str> = keywords.iter().map(String::as_str).collect();
        let mut candidates: Vec<Candidate> = scenarios
            .into_iter()
            .map(|scenario| {
                let scenario_keywords = self.tokenizer.tokenize(&scenario.description);
                let scenario_set: HashSet<&str> =
                    scenario_keywords.iter().map(String::as_str).collect();

                let overlap = query_set.intersection(&scenario_set).count();
                let union = query_set.union(&scenario_set).count();
                let score = if union > 0 {
                    overlap as f64 / union as f64
                } else {
                    0.0
                };

                let matched: Vec<String> = query_set
                    .intersection(&scenario_set)
                    .map(|s| s.to_string())
                    .collect();

                let mut candidate = Candidate::new(scenario, RetrievalSource::Keyword, score);
                candidate.matched_keywords = matched;
                candidate
            })
            .collect();

        // Weak batches get remapped so the merge weights don't drown them.
        let max_score = candidates
            .iter()
            .map(|c| c.scores.keyword.unwrap_or(0.0))
            .fold(0.0, f64::max);
        if max_score < self.config.normalize_trigger {
            debug!(max_score, "batch max below trigger, applying remap");
            let mut scores: Vec<f64> = candidates
                .iter()
                .map(|c| c.scores.keyword.unwrap_or(0.0))
                .collect();
            normalize::normalize_batch(&mut scores, self.config.normalize_method);
            for (candidate, score) in candidates.iter_mut().zip(scores) {
                candidate.scores.keyword = Some(score);
            }
        }

        sort_by_keyword_score(&mut candidates);
        candidates.truncate(top_k);
        candidates
    }

    /// Extract query keywords with caching; fold unseen lexicon terms into
    /// the tokenizer dictionary first so they tokenize as units.
    fn extract_keywords(&self, text: &str, lexicon: &[String]) -> Vec<String> {
        let cache_key = blake3::hash(text.as_bytes()).to_hex().to_string();
        if let Some(cached) = self.keyword_cache.get(&cache_key) {
            return cached.as_ref().clone();
        }

        let mut new_terms = 0usize;
        for term in lexicon {
            if !self.tokenizer.contains_term(term) {
                self.tokenizer.add_term(term);
                new_terms += 1;
            }
        }
        if new_terms > 0 {
            debug!(new_terms, "added lexicon terms to dictionary");
        }

        let keywords = self.tokenizer.tokenize(text);
        self.keyword_cache
            .insert(cache_key, Arc::new(keywords.clone()));
        keywords
    }
}

fn sort_by_keyword_score(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        let sa = a.scores.keyword.unwrap_or(0.0);
        let sb = b.scores.keyword.unwrap_or(0.0);
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id().cmp(&b.id()))
    });
}
