//! Prompt construction as pure functions over a structured context.
//!
//! Rendering never talks to a provider: it turns patient, clinical, and
//! candidate data into text, and the budget-aware assembly decides what
//! survives when the rendered prompt would blow the token budget. That keeps
//! truncation testable in isolation.

use meridian_core::models::{ClinicalContext, MergedCandidate, PatientProfile};

use crate::tokens::TokenEstimator;

/// Description length, in characters, after the shorten-before-drop step.
const SHORTENED_DESCRIPTION_CHARS: usize = 120;

/// Everything a prompt is rendered from.
pub struct PromptContext<'a> {
    pub patient: &'a PatientProfile,
    pub clinical: &'a ClinicalContext,
    pub candidates: &'a [MergedCandidate],
    pub max_sub_items: usize,
}

pub fn render_patient(patient: &PatientProfile) -> String {
    let mut out = String::from("Patient:\n");
    if let Some(age) = patient.age {
        out.push_str(&format!("- age: {age}\n"));
    }
    if let Some(sex) = &patient.sex {
        out.push_str(&format!("- sex: {sex}\n"));
    }
    if let Some(status) = &patient.pregnancy_status {
        out.push_str(&format!("- pregnancy status: {status}\n"));
    }
    if !patient.allergies.is_empty() {
        out.push_str(&format!("- allergies: {}\n", patient.allergies.join(", ")));
    }
    if !patient.comorbidities.is_empty() {
        out.push_str(&format!(
            "- comorbidities: {}\n",
            patient.comorbidities.join(", ")
        ));
    }
    out
}

pub fn render_clinical(clinical: &ClinicalContext) -> String {
    let mut out = String::from("Clinical context:\n");
    out.push_str(&format!("- department: {}\n", clinical.department));
    out.push_str(&format!("- chief complaint: {}\n", clinical.chief_complaint));
    if let Some(urgency) = &clinical.urgency {
        out.push_str(&format!("- severity: {urgency}\n"));
    }
    if let Some(duration) = &clinical.symptom_duration {
        out.push_str(&format!("- symptom duration: {duration}\n"));
    }
    if let Some(history) = &clinical.medical_history {
        out.push_str(&format!("- medical history: {history}\n"));
    }
    if let Some(diagnosis) = &clinical.diagnosis {
        out.push_str(&format!("- working diagnosis: {diagnosis}\n"));
    }
    out
}

/// Render one candidate block. `shorten` truncates the description to the
/// shortened length before the block is dropped entirely.
pub fn render_candidate(candidate: &MergedCandidate, index: usize, shorten: bool) -> String {
    let scenario = &candidate.scenario;
    let description = if shorten {
        let truncated: String = scenario
            .description
            .chars()
            .take(SHORTENED_DESCRIPTION_CHARS)
            .collect();
        format!("{truncated}...")
    } else {
        scenario.description.clone()
    };

    let mut out = format!("Scenario {index} (id {}):\n- description: {description}\n", scenario.id);
    out.push_str(&format!("- department: {}\n", scenario.department));
    if let Some(population) = &scenario.population {
        out.push_str(&format!("- population: {population}\n"));
    }
    if !candidate.sub_items.is_empty() {
        out.push_str("- procedures:\n");
        for (i, item) in candidate.sub_items.iter().enumerate() {
            let modality = item.modality.as_deref().unwrap_or("-");
            out.push_str(&format!(
                "  {}. {} [modality: {modality}, rating: {}]\n",
                i + 1,
                item.name,
                item.rating
            ));
        }
    }
    out
}

/// Grading instructions for the consolidated (single-call) prompt.
pub fn render_batch_instructions(candidate_count: usize, max_sub_items: usize) -> String {
    format!(
        "Task: from the {candidate_count} scenarios above, select the ones that fit the \
patient and grade each selected scenario's procedures by 1-based index into three \
buckets. Pick at most {max_sub_items} final procedure names per scenario.\n\
Respond with JSON only, in exactly this shape:\n\
{{\"selected_scenarios\": [{{\"scenario_index\": 1, \"scenario_id\": 0, \
\"comprehensive_score\": 0, \"scenario_reasoning\": \"...\", \"grading_reasoning\": \"...\", \
\"recommendation_grades\": {{\"highly_recommended\": [1], \"recommended\": [2], \
\"less_recommended\": [3]}}, \"final_choices\": [\"...\"]}}], \
\"overall_reasoning\": \"...\"}}\n"
    )
}

/// Grading instructions for one candidate (fan-out prompt).
pub fn render_single_instructions(scenario_index: usize, max_sub_items: usize) -> String {
    format!(
        "Task: grade scenario {scenario_index}'s procedures by 1-based index into three \
buckets and pick at most {max_sub_items} final procedure names.\n\
Respond with JSON only, in exactly this shape:\n\
{{\"comprehensive_score\": 0, \"scenario_reasoning\": \"...\", \"grading_reasoning\": \"...\", \
\"recommendation_grades\": {{\"highly_recommended\": [1], \"recommended\": [2], \
\"less_recommended\": [3]}}, \"final_choices\": [\"...\"]}}\n"
    )
}

/// Scenario-selection instructions (choose ids, no grading).
pub fn render_selection_instructions(top_k: usize) -> String {
    format!(
        "Task: choose the {top_k} scenario ids that best match the patient, ordered \
best-first. Consider age, sex, pregnancy status, department, and severity.\n\
Respond with JSON only, in exactly this shape:\n\
{{\"selected_scenario_ids\": [0], \"reasoning\": \"...\"}}\n"
    )
}

/// Assemble the consolidated prompt under a token budget.
///
/// The patient/clinical header and the instructions are always included.
/// Candidate blocks are appended best-first while they fit; a block that
/// would overflow is first retried with a shortened description and then
/// dropped, so the lowest-priority candidates go first.
pub fn build_batch_prompt(
    context: &PromptContext<'_>,
    estimator: &TokenEstimator,
    token_budget: usize,
) -> String {
    let header = format!(
        "{}\n{}\n",
        render_patient(context.patient),
        render_clinical(context.clinical)
    );
    let instructions =
        render_batch_instructions(context.candidates.len(), context.max_sub_items);

    let fixed_tokens = estimator.count_cached(&header) + estimator.count_cached(&instructions);
    let mut remaining = token_budget.saturating_sub(fixed_tokens);

    let mut blocks = String::new();
    let mut included = 0usize;
    for (i, candidate) in context.candidates.iter().enumerate() {
        let block = render_candidate(candidate, i + 1, false);
        let cost = estimator.count_cached(&block);
        if cost <= remaining {
            blocks.push_str(&block);
            remaining -= cost;
            included += 1;
            continue;
        }

        // Shorten before dropping.
        let short_block = render_candidate(candidate, i + 1, true);
        let short_cost = estimator.count_cached(&short_block);
        if short_cost <= remaining {
            blocks.push_str(&short_block);
            remaining -= short_cost;
            included += 1;
        } else {
            tracing::warn!(
                included,
                dropped = context.candidates.len() - included,
                "token budget reached, dropping remaining candidates"
            );
            break;
        }
    }

    format!("{header}{blocks}\n{instructions}")
}

/// Per-candidate prompt for the fan-out path.
pub fn build_single_prompt(
    patient: &PatientProfile,
    clinical: &ClinicalContext,
    candidate: &MergedCandidate,
    index: usize,
    max_sub_items: usize,
) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        render_patient(patient),
        render_clinical(clinical),
        render_candidate(candidate, index, false),
        render_single_instructions(index, max_sub_items)
    )
}

/// Scenario-selection prompt over candidate descriptions.
pub fn build_selection_prompt(
    patient: &PatientProfile,
    clinical: &ClinicalContext,
    candidates: &[MergedCandidate],
    top_k: usize,
    estimator: &TokenEstimator,
    token_budget: usize,
) -> String {
    let context = PromptContext {
        patient,
        clinical,
        candidates,
        max_sub_items: 0,
    };
    // Same budgeted assembly, selection instructions instead of grading.
    let header = format!(
        "{}\n{}\n",
        render_patient(context.patient),
        render_clinical(context.clinical)
    );
    let instructions = render_selection_instructions(top_k);
    let fixed_tokens = estimator.count_cached(&header) + estimator.count_cached(&instructions);
    let mut remaining = token_budget.saturating_sub(fixed_tokens);

    let mut blocks = String::new();
    for (i, candidate) in context.candidates.iter().enumerate() {
        let block = render_candidate(candidate, i + 1, false);
        let cost = estimator.count_cached(&block);
        if cost > remaining {
            break;
        }
        blocks.push_str(&block);
        remaining -= cost;
    }

    format!("{header}{blocks}\n{instructions}")
}
