//! Engine configuration: defaults, per-subsystem structs, TOML overrides.

pub mod defaults;

mod decision_config;
mod rerank_config;
mod retrieval_config;

pub use decision_config::{DecisionConfig, Environment, ThresholdConfig};
pub use rerank_config::RerankConfig;
pub use retrieval_config::{NormalizeMethod, RetrievalConfig, TierWeights};

use serde::{Deserialize, Serialize};

/// Aggregate engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retrieval: RetrievalConfig,
    pub decision: DecisionConfig,
    pub rerank: RerankConfig,
}

impl EngineConfig {
    /// Parse a TOML override document. Missing sections and fields fall back
    /// to defaults.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
