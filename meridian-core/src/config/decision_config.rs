use serde::{Deserialize, Serialize};

use super::defaults;

/// Deployment profile selecting a threshold preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
    Local,
}

/// Thresholds shared by the fixed and learning decision strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Estimated prompt tokens above which a single call is too large.
    pub token_threshold: usize,
    /// Candidate count a single call handles comfortably.
    pub max_scenarios_single_call: usize,
    /// Total sub-item count a single call handles comfortably.
    pub max_total_recommendations: usize,
    /// Average sub-items per candidate a single call handles comfortably.
    pub max_avg_recommendations: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            token_threshold: defaults::DEFAULT_TOKEN_THRESHOLD,
            max_scenarios_single_call: defaults::DEFAULT_MAX_SCENARIOS_SINGLE_CALL,
            max_total_recommendations: defaults::DEFAULT_MAX_TOTAL_RECOMMENDATIONS,
            max_avg_recommendations: defaults::DEFAULT_MAX_AVG_RECOMMENDATIONS,
        }
    }
}

impl ThresholdConfig {
    /// Preset thresholds per deployment environment.
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self {
                token_threshold: 4_000,
                max_scenarios_single_call: 3,
                max_total_recommendations: 20,
                max_avg_recommendations: 6.0,
            },
            Environment::Production => Self {
                token_threshold: 4_000,
                max_scenarios_single_call: 5,
                max_total_recommendations: 30,
                max_avg_recommendations: 10.0,
            },
            Environment::Local => Self {
                token_threshold: 4_000,
                max_scenarios_single_call: 4,
                max_total_recommendations: 25,
                max_avg_recommendations: 7.0,
            },
        }
    }
}

/// Adaptive decision engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Deployment profile; selects the initial thresholds.
    pub environment: Environment,
    /// Enable the learning strategy (threshold adjustment from history).
    pub learning: bool,
    /// Learning-history capacity (FIFO eviction beyond this).
    pub history_capacity: usize,
    /// Re-evaluate thresholds every N recorded outcomes.
    pub adjust_every: usize,
    /// Lower clamp for the learned token threshold.
    pub token_threshold_floor: usize,
    /// Upper clamp for the learned token threshold.
    pub token_threshold_ceiling: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            learning: true,
            history_capacity: defaults::DEFAULT_HISTORY_CAPACITY,
            adjust_every: defaults::DEFAULT_ADJUST_EVERY,
            token_threshold_floor: defaults::DEFAULT_TOKEN_THRESHOLD_FLOOR,
            token_threshold_ceiling: defaults::DEFAULT_TOKEN_THRESHOLD_CEILING,
        }
    }
}
