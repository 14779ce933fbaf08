use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which execution strategy the decision engine chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// One consolidated completion call over all candidates.
    Single,
    /// Bounded-concurrency fan-out of per-candidate calls.
    Concurrent,
}

/// Snapshot of one cost-estimate decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionMetrics {
    pub estimated_tokens: usize,
    pub candidate_count: usize,
    pub total_sub_items: usize,
    pub avg_sub_items: f64,

    /// estimated_tokens / token_threshold.
    pub token_ratio: f64,
    /// candidate_count / max_scenarios_single_call.
    pub scenario_ratio: f64,
    /// total_sub_items / max_total_recommendations.
    pub total_ratio: f64,
    /// avg_sub_items / max_avg_recommendations.
    pub avg_ratio: f64,

    /// 0.5*token + 0.2*scenario + 0.2*total + 0.1*avg.
    pub composite_score: f64,
    /// Names of the hard override conditions that fired.
    pub hard_conditions: Vec<&'static str>,
    pub strategy: StrategyKind,
    pub reason: String,
}

/// One recorded invocation outcome, used for threshold learning.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub metrics: DecisionMetrics,
    pub duration_ms: u64,
    pub success: bool,
    pub strategy_used: StrategyKind,
    pub recorded_at: DateTime<Utc>,
}
