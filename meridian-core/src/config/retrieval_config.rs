use serde::{Deserialize, Serialize};

use super::defaults;

/// Non-linear remap applied to keyword scores when the batch maximum is low.
/// All methods are monotonic and map into the configured [floor, ceiling].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMethod {
    Sigmoid,
    #[default]
    Power,
    Log,
    Exponential,
    Tanh,
}

/// Per-tier source weights used by the merge-and-score engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TierWeights {
    /// Tier-1 keyword weight.
    pub keyword: f64,
    /// Tier-1 semantic weight.
    pub semantic: f64,
    /// Tier-1 diversity weight.
    pub diversity: f64,
}

impl Default for TierWeights {
    fn default() -> Self {
        Self {
            keyword: defaults::DEFAULT_WEIGHT_KEYWORD,
            semantic: defaults::DEFAULT_WEIGHT_SEMANTIC,
            diversity: defaults::DEFAULT_WEIGHT_DIVERSITY,
        }
    }
}

/// Retrieval subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Intermediate candidate pool size per retriever.
    pub top_p: usize,
    /// Final candidate count per retriever and for the merged result.
    pub top_k: usize,
    /// Candidates below this similarity are dropped.
    pub similarity_threshold: f64,
    /// Remap method for low keyword-score batches.
    pub normalize_method: NormalizeMethod,
    /// Batch-max trigger below which the remap applies.
    pub normalize_trigger: f64,
    /// MMR fetches `top_p` and returns up to `mmr_fetch_multiplier * top_k`.
    pub mmr_fetch_multiplier: usize,
    /// Capacity of the keyword-extraction cache.
    pub keyword_cache_size: u64,
    /// Tier-1 merge weights. Last so TOML serialization emits scalar keys
    /// before the nested table.
    pub tier_weights: TierWeights,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_p: defaults::DEFAULT_TOP_P,
            top_k: defaults::DEFAULT_TOP_K,
            similarity_threshold: defaults::DEFAULT_SIMILARITY_THRESHOLD,
            tier_weights: TierWeights::default(),
            normalize_method: NormalizeMethod::default(),
            normalize_trigger: defaults::DEFAULT_NORMALIZE_TRIGGER,
            mmr_fetch_multiplier: defaults::DEFAULT_MMR_FETCH_MULTIPLIER,
            keyword_cache_size: defaults::DEFAULT_KEYWORD_CACHE_SIZE,
        }
    }
}
