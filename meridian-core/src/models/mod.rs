//! Data model: queries, scenarios, candidates, grades, decision metrics.

mod candidate;
mod decision;
mod grade;
mod query;
mod scenario;

pub use candidate::{Candidate, ComboType, MatchTier, MergedCandidate, RetrievalSource, SourceScores};
pub use decision::{DecisionMetrics, DecisionOutcome, StrategyKind};
pub use grade::GradeDecision;
pub use query::{ClinicalContext, PatientProfile, RecommendQuery};
pub use scenario::{Scenario, SubItem};
