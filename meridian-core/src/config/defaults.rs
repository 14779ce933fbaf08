// Single source of truth for all default values.

// --- Retrieval ---
pub const DEFAULT_TOP_P: usize = 50;
pub const DEFAULT_TOP_K: usize = 16;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;
pub const DEFAULT_MMR_FETCH_MULTIPLIER: usize = 4;
pub const DEFAULT_KEYWORD_CACHE_SIZE: u64 = 10_000;

// Tier-1 source weights (keyword / semantic / diversity).
pub const DEFAULT_WEIGHT_KEYWORD: f64 = 0.2;
pub const DEFAULT_WEIGHT_SEMANTIC: f64 = 0.5;
pub const DEFAULT_WEIGHT_DIVERSITY: f64 = 0.3;

// Score normalization. Remap kicks in when the batch max is below the
// trigger, mapping into [floor, ceiling].
pub const DEFAULT_NORMALIZE_TRIGGER: f64 = 0.7;
pub const DEFAULT_NORMALIZE_FLOOR: f64 = 0.5;
pub const DEFAULT_NORMALIZE_CEILING: f64 = 0.95;

// Default similarity band for MMR-only hits in the diversity retriever.
pub const DEFAULT_MMR_SIMILARITY_LOW: f64 = 0.90;
pub const DEFAULT_MMR_SIMILARITY_HIGH: f64 = 0.95;

// --- Decision engine ---
pub const DEFAULT_TOKEN_THRESHOLD: usize = 4_000;
pub const DEFAULT_MAX_SCENARIOS_SINGLE_CALL: usize = 5;
pub const DEFAULT_MAX_TOTAL_RECOMMENDATIONS: usize = 30;
pub const DEFAULT_MAX_AVG_RECOMMENDATIONS: f64 = 10.0;
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
pub const DEFAULT_ADJUST_EVERY: usize = 20;
pub const DEFAULT_TOKEN_THRESHOLD_FLOOR: usize = 2_000;
pub const DEFAULT_TOKEN_THRESHOLD_CEILING: usize = 8_000;

// --- Rerank ---
pub const DEFAULT_MAX_SCENARIOS: usize = 3;
pub const DEFAULT_MAX_SUB_ITEMS: usize = 3;
pub const DEFAULT_MIN_RATING: u8 = 5;
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 3;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SUB_ITEM_CONCURRENCY: usize = 8;
pub const DEFAULT_PROMPT_TOKEN_BUDGET: usize = 4_000;
