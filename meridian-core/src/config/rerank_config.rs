use serde::{Deserialize, Serialize};

use super::defaults;

/// Rerank subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Candidates to keep after reranking.
    pub max_scenarios: usize,
    /// Sub-items to surface per candidate.
    pub max_sub_items: usize,
    /// Minimum ordinal rating for sub-item attachment.
    pub min_rating: u8,
    /// Concurrency bound for the fan-out completion path.
    pub max_concurrent_calls: usize,
    /// Hard deadline per completion call.
    pub call_timeout_secs: u64,
    /// Concurrency bound for sub-item store lookups.
    pub sub_item_concurrency: usize,
    /// Token budget for a rendered prompt.
    pub prompt_token_budget: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            max_scenarios: defaults::DEFAULT_MAX_SCENARIOS,
            max_sub_items: defaults::DEFAULT_MAX_SUB_ITEMS,
            min_rating: defaults::DEFAULT_MIN_RATING,
            max_concurrent_calls: defaults::DEFAULT_MAX_CONCURRENT_CALLS,
            call_timeout_secs: defaults::DEFAULT_CALL_TIMEOUT_SECS,
            sub_item_concurrency: defaults::DEFAULT_SUB_ITEM_CONCURRENCY,
            prompt_token_budget: defaults::DEFAULT_PROMPT_TOKEN_BUDGET,
        }
    }
}
