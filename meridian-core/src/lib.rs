//! # meridian-core
//!
//! Core types, traits, errors, config, and alias tables for the Meridian
//! clinical procedure recommendation engine.
//!
//! Everything here is I/O-free: collaborator services (tokenizer, embedding
//! provider, vector index, completion provider, scenario store) are consumed
//! through the traits in [`traits`], and the concrete engines live in
//! `meridian-retrieval` and `meridian-rerank`.

pub mod aliases;
pub mod config;
pub mod errors;
pub mod models;
pub mod traits;
pub mod vocab;

pub use errors::{MeridianError, MeridianResult};
pub use models::{
    Candidate, ClinicalContext, ComboType, DecisionMetrics, GradeDecision, MatchTier,
    MergedCandidate, PatientProfile, RecommendQuery, RetrievalSource, Scenario, SourceScores,
    SubItem,
};
