//! Grade-bucket assembly and the rule-based fallback grader.
//!
//! The fallback never fails: it operates purely on already-validated numeric
//! fields (ordinal ratings plus safety flags), so a request always ends with
//! a complete three-bucket decision.

use tracing::warn;

use meridian_core::aliases;
use meridian_core::models::{GradeDecision, MergedCandidate, PatientProfile, SubItem};

use crate::parse::{GradeBuckets, SingleGrading};
use crate::rule;

/// Rating at or above which an unflagged sub-item is highly recommended.
const HIGHLY_RATING: u8 = 7;
/// Rating at or above which a sub-item is at least recommended.
const RECOMMENDED_RATING: u8 = 4;

/// Map validated bucket indices (1-based) onto the candidate's sub-items.
/// Invalid indices are logged and skipped.
pub fn apply_buckets(
    candidate: &MergedCandidate,
    buckets: &GradeBuckets,
    max_choices: usize,
) -> GradeDecision {
    let mut decision = GradeDecision::default();
    let items = &candidate.sub_items;

    let mut assign = |indices: &[i64], bucket: &mut Vec<SubItem>, label: &str| {
        for &index in indices {
            if index >= 1 && (index as usize) <= items.len() {
                bucket.push(items[index as usize - 1].clone());
            } else {
                warn!(
                    scenario = candidate.id(),
                    index, bucket = label, "grade index out of range, skipping"
                );
            }
        }
    };

    assign(
        &buckets.highly_recommended,
        &mut decision.highly_recommended,
        "highly_recommended",
    );
    assign(&buckets.recommended, &mut decision.recommended, "recommended");
    assign(
        &buckets.less_recommended,
        &mut decision.less_recommended,
        "less_recommended",
    );

    decision.final_choices = derive_final_choices(&decision, max_choices);
    decision
}

/// Build a GradeDecision from a parsed per-candidate response.
pub fn from_single_grading(
    candidate: &MergedCandidate,
    grading: &SingleGrading,
    max_choices: usize,
) -> GradeDecision {
    let mut decision = apply_buckets(candidate, &grading.recommendation_grades, max_choices);
    decision.scenario_reasoning = grading.scenario_reasoning.clone();
    decision.grading_reasoning = grading.grading_reasoning.clone();
    decision.comprehensive_score = grading.comprehensive_score.clamp(0.0, 100.0).round() as u32;
    if !grading.final_choices.is_empty() {
        decision.final_choices = grading
            .final_choices
            .iter()
            .take(max_choices)
            .cloned()
            .collect();
    }
    decision
}

/// Deterministic rating-band grading with safety demotion. Never fails.
///
/// Unflagged ratings ≥ 7 are highly recommended, 4–6 recommended, the rest
/// less recommended. Any safety flag keeps an item out of the highly bucket;
/// two or more flags demote it to less recommended.
pub fn fallback_grade(
    candidate: &MergedCandidate,
    patient: &PatientProfile,
    max_choices: usize,
) -> GradeDecision {
    let mut decision = GradeDecision {
        fallback_used: true,
        scenario_reasoning: "rule-based grading: ratings and safety flags only".to_string(),
        grading_reasoning: format!(
            "rating >= {HIGHLY_RATING} and no safety flags: highly recommended; \
rating >= {RECOMMENDED_RATING} with at most one flag: recommended; otherwise less recommended"
        ),
        ..Default::default()
    };

    for item in &candidate.sub_items {
        let flags = safety_flags(item, patient);
        if item.rating >= HIGHLY_RATING && flags.is_empty() {
            decision.highly_recommended.push(item.clone());
        } else if item.rating >= RECOMMENDED_RATING && flags.len() <= 1 {
            decision.recommended.push(item.clone());
        } else {
            decision.less_recommended.push(item.clone());
        }
    }

    decision.comprehensive_score = rule::comprehensive_score(&candidate.sub_items, &decision);
    decision.final_choices = derive_final_choices(&decision, max_choices);
    decision
}

/// Safety flags for a sub-item given the patient.
fn safety_flags(item: &SubItem, patient: &PatientProfile) -> Vec<&'static str> {
    let mut flags = Vec::new();

    let pregnant = patient
        .pregnancy_status
        .as_deref()
        .and_then(|s| aliases::pregnancy_table().resolve(s))
        .map(|canonical| canonical == "pregnant")
        .unwrap_or(false);
    if pregnant {
        if let Some(safety) = &item.pregnancy_safety {
            if safety.to_lowercase().contains("contraindicated") {
                flags.push("pregnancy_contraindicated");
            }
        }
    }

    if let Some(level) = &item.radiation_level {
        let level = level.to_lowercase();
        if level == "high" || level == "medium" {
            flags.push("radiation_exposure");
        }
    }

    if item
        .contraindications
        .as_deref()
        .map(|c| !c.trim().is_empty())
        .unwrap_or(false)
    {
        flags.push("contraindications_present");
    }

    flags
}

/// Final shortlist: best buckets first, up to `max_choices` names.
fn derive_final_choices(decision: &GradeDecision, max_choices: usize) -> Vec<String> {
    decision
        .highly_recommended
        .iter()
        .chain(&decision.recommended)
        .chain(&decision.less_recommended)
        .take(max_choices)
        .map(|item| item.name.clone())
        .collect()
}
