use serde::{Deserialize, Serialize};

use super::scenario::SubItem;

/// Three-bucket grading of a candidate's sub-items.
///
/// All three buckets always exist (possibly empty): a GradeDecision is
/// never partially populated, whether it came from the completion provider
/// or from the deterministic fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GradeDecision {
    pub highly_recommended: Vec<SubItem>,
    pub recommended: Vec<SubItem>,
    pub less_recommended: Vec<SubItem>,
    /// Why this candidate fits the patient.
    pub scenario_reasoning: String,
    /// How the buckets were assigned.
    pub grading_reasoning: String,
    /// Overall fit score in [0, 100].
    pub comprehensive_score: u32,
    /// Final shortlist of procedure names.
    pub final_choices: Vec<String>,
    /// Set when the rule-based fallback produced this decision.
    pub fallback_used: bool,
}

impl GradeDecision {
    pub fn total_graded(&self) -> usize {
        self.highly_recommended.len() + self.recommended.len() + self.less_recommended.len()
    }
}
