//! # meridian-rerank
//!
//! Candidate refinement: rule-based scoring against patient context, an
//! adaptive single-call vs. fan-out decision engine with online threshold
//! learning, and a completion-backed reranker with graded parsing fallback.
//!
//! ## Architecture
//!
//! ```text
//! RerankPipeline (strategy surface)
//! ├── sub-item attachment (bounded concurrency)
//! ├── RuleRanker        (alias-aware structure/priority scoring)
//! ├── LlmReranker
//! │   ├── DecisionEngine (Fixed | Learning thresholds)
//! │   ├── prompt         (budget-aware PromptContext rendering)
//! │   ├── parse          (tiered response parsing)
//! │   └── grading        (bucket mapping + rating-band fallback)
//! └── TokenEstimator    (tiktoken + heuristic fallback)
//! ```

pub mod decision;
pub mod grading;
pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod reranker;
pub mod rule;
pub mod tokens;

pub use decision::DecisionEngine;
pub use pipeline::{RerankPipeline, RerankStrategy};
pub use reranker::{GradedCandidate, LlmReranker};
pub use tokens::TokenEstimator;
