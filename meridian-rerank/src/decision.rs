//! Adaptive single-call vs. fan-out decision engine.
//!
//! Estimates whether one consolidated completion call can handle the
//! candidate batch, from four cost ratios folded into a composite score with
//! hard overrides. The learning strategy additionally records invocation
//! outcomes in a bounded history and periodically nudges the token threshold
//! toward whichever execution path has been performing better.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{info, warn};

use meridian_core::config::{DecisionConfig, ThresholdConfig};
use meridian_core::models::{DecisionMetrics, DecisionOutcome, MergedCandidate, StrategyKind};

// Composite weights: token / scenario / total / average ratios.
const W_TOKEN: f64 = 0.5;
const W_SCENARIO: f64 = 0.2;
const W_TOTAL: f64 = 0.2;
const W_AVG: f64 = 0.1;

// Hard override limits per ratio.
const HARD_TOKEN: f64 = 1.0;
const HARD_SCENARIO: f64 = 1.5;
const HARD_TOTAL: f64 = 2.0;
const HARD_AVG: f64 = 1.8;

/// Composite score above which the fan-out path wins.
const COMPOSITE_LIMIT: f64 = 1.0;

/// Minimum records per strategy before thresholds may move.
const MIN_RECORDS_PER_STRATEGY: usize = 5;

struct LearningState {
    thresholds: ThresholdConfig,
    history: VecDeque<DecisionOutcome>,
    recorded: usize,
}

enum Strategy {
    Fixed(ThresholdConfig),
    Learning(Mutex<LearningState>),
}

/// The decision engine. Strategy is chosen once at construction; there is no
/// runtime strategy inspection beyond this tagged enum.
pub struct DecisionEngine {
    strategy: Strategy,
    config: DecisionConfig,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        let thresholds = ThresholdConfig::for_environment(config.environment);
        let strategy = if config.learning {
            Strategy::Learning(Mutex::new(LearningState {
                thresholds,
                history: VecDeque::with_capacity(config.history_capacity),
                recorded: 0,
            }))
        } else {
            Strategy::Fixed(thresholds)
        };
        Self { strategy, config }
    }

    /// Current token threshold (possibly adjusted by learning).
    pub fn token_threshold(&self) -> usize {
        match &self.strategy {
            Strategy::Fixed(t) => t.token_threshold,
            Strategy::Learning(state) => {
                state.lock().expect("learning state poisoned").thresholds.token_threshold
            }
        }
    }

    /// Decide between one consolidated call and the bounded fan-out.
    pub fn should_use_concurrent(
        &self,
        candidates: &[MergedCandidate],
        estimated_tokens: usize,
    ) -> (bool, DecisionMetrics) {
        let thresholds = self.current_thresholds();

        let candidate_count = candidates.len();
        let total_sub_items: usize = candidates.iter().map(|c| c.sub_items.len()).sum();
        let avg_sub_items = total_sub_items as f64 / candidate_count.max(1) as f64;

        let token_ratio = estimated_tokens as f64 / thresholds.token_threshold as f64;
        let scenario_ratio = candidate_count as f64 / thresholds.max_scenarios_single_call as f64;
        let total_ratio = total_sub_items as f64 / thresholds.max_total_recommendations as f64;
        let avg_ratio = avg_sub_items / thresholds.max_avg_recommendations;

        let composite_score = W_TOKEN * token_ratio
            + W_SCENARIO * scenario_ratio
            + W_TOTAL * total_ratio
            + W_AVG * avg_ratio;

        let mut hard_conditions = Vec::new();
        if token_ratio > HARD_TOKEN {
            hard_conditions.push("token_exceeded");
        }
        if scenario_ratio > HARD_SCENARIO {
            hard_conditions.push("scenarios_exceeded");
        }
        if total_ratio > HARD_TOTAL {
            hard_conditions.push("total_recommendations_exceeded");
        }
        if avg_ratio > HARD_AVG {
            hard_conditions.push("avg_recommendations_exceeded");
        }

        let use_concurrent = composite_score > COMPOSITE_LIMIT || !hard_conditions.is_empty();

        let reason = if composite_score > COMPOSITE_LIMIT {
            format!("composite score {composite_score:.2} above {COMPOSITE_LIMIT}")
        } else if !hard_conditions.is_empty() {
            format!("{} hard conditions triggered", hard_conditions.len())
        } else {
            format!("composite score {composite_score:.2} within budget")
        };

        let metrics = DecisionMetrics {
            estimated_tokens,
            candidate_count,
            total_sub_items,
            avg_sub_items,
            token_ratio,
            scenario_ratio,
            total_ratio,
            avg_ratio,
            composite_score,
            hard_conditions,
            strategy: if use_concurrent {
                StrategyKind::Concurrent
            } else {
                StrategyKind::Single
            },
            reason,
        };

        info!(
            estimated_tokens,
            candidate_count,
            total_sub_items,
            composite = metrics.composite_score,
            concurrent = use_concurrent,
            reason = %metrics.reason,
            "execution strategy decided"
        );

        (use_concurrent, metrics)
    }

    /// Record a real invocation outcome. No-op for the fixed strategy.
    pub fn record_outcome(
        &self,
        metrics: DecisionMetrics,
        duration_ms: u64,
        success: bool,
        strategy_used: StrategyKind,
    ) {
        let Strategy::Learning(state) = &self.strategy else {
            return;
        };
        let mut state = state.lock().expect("learning state poisoned");

        state.history.push_back(DecisionOutcome {
            metrics,
            duration_ms,
            success,
            strategy_used,
            recorded_at: Utc::now(),
        });
        while state.history.len() > self.config.history_capacity {
            state.history.pop_front();
        }
        state.recorded += 1;

        if state.recorded % self.config.adjust_every == 0 {
            self.adjust_thresholds(&mut state);
        }
    }

    /// Number of outcomes currently held in the learning history.
    pub fn history_len(&self) -> usize {
        match &self.strategy {
            Strategy::Fixed(_) => 0,
            Strategy::Learning(state) => {
                state.lock().expect("learning state poisoned").history.len()
            }
        }
    }

    fn current_thresholds(&self) -> ThresholdConfig {
        match &self.strategy {
            Strategy::Fixed(t) => t.clone(),
            Strategy::Learning(state) => {
                state.lock().expect("learning state poisoned").thresholds.clone()
            }
        }
    }

    fn adjust_thresholds(&self, state: &mut LearningState) {
        let single: Vec<&DecisionOutcome> = state
            .history
            .iter()
            .filter(|r| r.strategy_used == StrategyKind::Single)
            .collect();
        let concurrent: Vec<&DecisionOutcome> = state
            .history
            .iter()
            .filter(|r| r.strategy_used == StrategyKind::Concurrent)
            .collect();

        if single.len() < MIN_RECORDS_PER_STRATEGY || concurrent.len() < MIN_RECORDS_PER_STRATEGY {
            return;
        }

        let avg = |records: &[&DecisionOutcome]| {
            records.iter().map(|r| r.duration_ms as f64).sum::<f64>() / records.len() as f64
        };
        let success_rate = |records: &[&DecisionOutcome]| {
            records.iter().filter(|r| r.success).count() as f64 / records.len() as f64
        };

        let avg_single = avg(&single);
        let avg_concurrent = avg(&concurrent);
        if avg_concurrent <= 0.0 {
            warn!("concurrent duration average is zero, skipping adjustment");
            return;
        }
        let time_ratio = avg_single / avg_concurrent;
        let single_success = success_rate(&single);

        let current = state.thresholds.token_threshold;
        if time_ratio < 0.8 && single_success >= 0.9 {
            // Single calls are clearly winning: allow bigger single prompts.
            let raised = ((current as f64 * 1.1) as usize).min(self.config.token_threshold_ceiling);
            if raised != current {
                info!(from = current, to = raised, "raising token threshold");
                state.thresholds.token_threshold = raised;
            }
        } else if time_ratio > 1.2 || single_success < 0.8 {
            let lowered = ((current as f64 * 0.9) as usize).max(self.config.token_threshold_floor);
            if lowered != current {
                info!(from = current, to = lowered, "lowering token threshold");
                state.thresholds.token_threshold = lowered;
            }
        }
    }
}
