//! Rule-based scenario scoring against structured patient context.
//!
//! Two aggregate scores per candidate: structural match (age, sex,
//! pregnancy) and clinical priority (department, urgency), each the mean of
//! its nonzero sub-scores. Unknown or unmatched dimensions are excluded from
//! the average rather than penalized. The aggregates blend with the
//! retrieval scores into a single rule score.

use tracing::debug;

use meridian_core::aliases;
use meridian_core::models::{
    ClinicalContext, GradeDecision, MergedCandidate, PatientProfile, Scenario, SubItem,
};

// Blend weights, keyed by which aggregate scores are available.
// Both: semantic / structure / priority / diversity.
const BLEND_BOTH: (f64, f64, f64, f64) = (0.3, 0.2, 0.2, 0.3);
// One aggregate: semantic / aggregate / diversity.
const BLEND_ONE: (f64, f64, f64) = (0.35, 0.3, 0.35);
// Neither: semantic / diversity.
const BLEND_NEITHER: (f64, f64) = (0.5, 0.5);

/// Structural match score in [0, 1]: mean of the nonzero age, sex, and
/// pregnancy sub-scores.
pub fn structure_score(scenario: &Scenario, patient: &PatientProfile) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u32;

    if let Some(age) = patient.age {
        let text = scenario
            .age_group
            .clone()
            .unwrap_or_else(|| scenario.description.clone());
        let score = aliases::match_age(age, &text);
        if score != 0.0 {
            sum += score;
            count += 1;
        }
    }

    if let Some(sex) = &patient.sex {
        let requirement = scenario.sex.clone().or_else(|| {
            aliases::sex_table()
                .resolve_in_text(&scenario.description)
                .map(str::to_string)
        });
        if let Some(requirement) = requirement {
            let score = aliases::sex_table().match_score(sex, &requirement);
            if score != 0.0 {
                sum += score;
                count += 1;
            }
        }
    }

    if let Some(status) = &patient.pregnancy_status {
        let requirement = scenario.pregnancy_status.clone().or_else(|| {
            aliases::pregnancy_table()
                .resolve_in_text(&scenario.description)
                .map(str::to_string)
        });
        if let Some(requirement) = requirement {
            let score = aliases::pregnancy_table().match_score(status, &requirement);
            if score != 0.0 {
                sum += score;
                count += 1;
            }
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Clinical priority score in [0, 1]: mean of the nonzero department and
/// urgency sub-scores.
pub fn priority_score(scenario: &Scenario, clinical: &ClinicalContext) -> f64 {
    let mut sum = 0.0;
    let mut count = 0u32;

    if !clinical.department.is_empty() {
        let score = aliases::department_table().match_score(&clinical.department, &scenario.department);
        if score != 0.0 {
            sum += score;
            count += 1;
        }
    }

    if let Some(urgency) = &clinical.urgency {
        let requirement = scenario.urgency.clone().or_else(|| {
            aliases::urgency_table()
                .resolve_in_text(&scenario.description)
                .map(str::to_string)
        });
        if let Some(requirement) = requirement {
            let score = aliases::urgency_table().match_score(urgency, &requirement);
            if score != 0.0 {
                sum += score;
                count += 1;
            }
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Blend the aggregates with the retrieval scores into a rule score.
///
/// A candidate carrying neither a semantic nor a diversity score (keyword
/// only) falls back to its merge score so it still ranks.
pub fn blend(candidate: &MergedCandidate, structure: f64, priority: f64) -> f64 {
    let semantic = candidate.scores.semantic;
    let diversity = candidate.scores.diversity;

    let retrieval_pair = match (semantic, diversity) {
        (Some(s), Some(d)) => Some((s, d)),
        _ => None,
    };

    match (structure != 0.0, priority != 0.0) {
        (true, true) => match retrieval_pair {
            Some((s, d)) => {
                BLEND_BOTH.0 * s + BLEND_BOTH.1 * structure + BLEND_BOTH.2 * priority + BLEND_BOTH.3 * d
            }
            None => single_retrieval_score(candidate),
        },
        (true, false) => match retrieval_pair {
            Some((s, d)) => BLEND_ONE.0 * s + BLEND_ONE.1 * structure + BLEND_ONE.2 * d,
            None => single_retrieval_score(candidate),
        },
        (false, true) => match retrieval_pair {
            Some((s, d)) => BLEND_ONE.0 * s + BLEND_ONE.1 * priority + BLEND_ONE.2 * d,
            None => single_retrieval_score(candidate),
        },
        (false, false) => match retrieval_pair {
            Some((s, d)) => BLEND_NEITHER.0 * s + BLEND_NEITHER.1 * d,
            None => single_retrieval_score(candidate),
        },
    }
}

fn single_retrieval_score(candidate: &MergedCandidate) -> f64 {
    candidate
        .scores
        .semantic
        .or(candidate.scores.diversity)
        .unwrap_or(candidate.final_score)
}

/// Annotate every candidate with its rule score and sort descending.
pub fn rank(
    candidates: &mut Vec<MergedCandidate>,
    patient: &PatientProfile,
    clinical: &ClinicalContext,
) {
    for candidate in candidates.iter_mut() {
        let structure = structure_score(&candidate.scenario, patient);
        let priority = priority_score(&candidate.scenario, clinical);
        let score = blend(candidate, structure, priority);
        debug!(
            id = candidate.id(),
            structure, priority, score, "rule score computed"
        );
        candidate.rule_score = Some(score);
    }
    candidates.sort_by(|a, b| {
        let sa = a.rule_score.unwrap_or(0.0);
        let sb = b.rule_score.unwrap_or(0.0);
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id().cmp(&b.id()))
    });
}

/// Deterministic overall fit score in [0, 100] for a graded candidate:
/// weighted mix of the highly-recommended share and the mean rating.
pub fn comprehensive_score(sub_items: &[SubItem], decision: &GradeDecision) -> u32 {
    if sub_items.is_empty() {
        return 0;
    }
    let highly_ratio = decision.highly_recommended.len() as f64 / sub_items.len() as f64;
    let avg_rating =
        sub_items.iter().map(|s| s.rating as f64).sum::<f64>() / sub_items.len() as f64;
    ((highly_ratio * 0.7 + avg_rating / 9.0 * 0.3) * 100.0).round() as u32
}
