//! Tiered completion-response parsing.
//!
//! An ordered sequence of pure parse attempts, each returning `Option`:
//! (1) strip code fences and parse directly, (2) extract the first balanced
//! `{...}` block, (3) apply targeted repairs and re-parse, (4) regex-extract
//! just the required id-list fields. The first attempt whose output survives
//! shape validation wins; exhausting every tier yields `None`, never an
//! error; the caller falls back to rule-based grading.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// 1-based sub-item indices per grading bucket. Indices are validated
/// against the candidate's sub-item list downstream; out-of-range entries
/// are skipped there, not here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GradeBuckets {
    pub highly_recommended: Vec<i64>,
    pub recommended: Vec<i64>,
    pub less_recommended: Vec<i64>,
}

/// One graded scenario from the consolidated response.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectedScenario {
    /// 1-based index into the prompt's scenario list.
    pub scenario_index: usize,
    #[serde(default)]
    pub scenario_id: Option<u64>,
    pub comprehensive_score: f64,
    #[serde(default)]
    pub scenario_reasoning: String,
    #[serde(default)]
    pub grading_reasoning: String,
    pub recommendation_grades: GradeBuckets,
    pub final_choices: Vec<String>,
}

/// Consolidated (single-call) grading response.
#[derive(Debug, Clone, Deserialize)]
pub struct GradingResponse {
    pub selected_scenarios: Vec<SelectedScenario>,
    #[serde(default)]
    pub overall_reasoning: String,
}

/// Per-candidate grading response (fan-out path).
#[derive(Debug, Clone, Deserialize)]
pub struct SingleGrading {
    pub recommendation_grades: GradeBuckets,
    #[serde(default)]
    pub comprehensive_score: f64,
    #[serde(default)]
    pub scenario_reasoning: String,
    #[serde(default)]
    pub grading_reasoning: String,
    #[serde(default)]
    pub final_choices: Vec<String>,
}

/// Scenario-selection response.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionResponse {
    pub selected_scenario_ids: Vec<u64>,
    #[serde(default)]
    pub reasoning: String,
}

/// Parse a consolidated grading response through the tier chain.
pub fn parse_grading(text: &str) -> Option<GradingResponse> {
    run_tiers(text, extract_grading_fields)
}

/// Parse a per-candidate grading response through the tier chain.
pub fn parse_single_grading(text: &str) -> Option<SingleGrading> {
    run_tiers(text, extract_single_grading_fields)
}

/// Parse a scenario-selection response through the tier chain.
pub fn parse_selection(text: &str) -> Option<SelectionResponse> {
    run_tiers(text, extract_selection_fields)
}

/// Walk the tiers; `last_resort` is the shape-specific field extractor.
fn run_tiers<T: serde::de::DeserializeOwned>(
    text: &str,
    last_resort: fn(&str) -> Option<Value>,
) -> Option<T> {
    let cleaned = strip_code_fences(text);
    let attempts: [fn(&str) -> Option<Value>; 3] =
        [attempt_direct, attempt_balanced, attempt_repaired];

    for (tier, attempt) in attempts.iter().enumerate() {
        if let Some(value) = attempt(&cleaned) {
            match serde_json::from_value::<T>(value) {
                Ok(parsed) => {
                    debug!(tier = tier + 1, "response parsed");
                    return Some(parsed);
                }
                Err(e) => debug!(tier = tier + 1, error = %e, "shape validation failed"),
            }
        }
    }

    if let Some(value) = last_resort(&cleaned) {
        if let Ok(parsed) = serde_json::from_value::<T>(value) {
            debug!(tier = 4, "response recovered by field extraction");
            return Some(parsed);
        }
    }
    None
}

/// Remove Markdown code-fence markers, keeping their content.
pub fn strip_code_fences(text: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"```(?:[Jj][Ss][Oo][Nn])?").expect("fence regex"));
    fence.replace_all(text, "").trim().to_string()
}

fn attempt_direct(text: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(text).ok()?;
    value.is_object().then_some(value)
}

fn attempt_balanced(text: &str) -> Option<Value> {
    let block = balanced_object(text)?;
    serde_json::from_str(block).ok()
}

fn attempt_repaired(text: &str) -> Option<Value> {
    // Repair the balanced block when one exists, otherwise everything from
    // the first brace (covers truncated tails).
    let candidate = balanced_object(text)
        .map(str::to_string)
        .or_else(|| text.find('{').map(|pos| text[pos..].to_string()))?;
    let repaired = repair_json(&candidate);
    let value: Value = serde_json::from_str(&repaired).ok()?;
    value.is_object().then_some(value)
}

/// First balanced `{...}` block, honoring strings and escapes.
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Targeted repairs for the JSON shapes completion providers actually emit.
pub fn repair_json(text: &str) -> String {
    static LINE_COMMENT: OnceLock<Regex> = OnceLock::new();
    static BLOCK_COMMENT: OnceLock<Regex> = OnceLock::new();
    static SINGLE_QUOTED: OnceLock<Regex> = OnceLock::new();
    static UNQUOTED_KEY: OnceLock<Regex> = OnceLock::new();
    static TRAILING_COMMA: OnceLock<Regex> = OnceLock::new();

    let line_comment =
        LINE_COMMENT.get_or_init(|| Regex::new(r"//[^\n]*").expect("line comment regex"));
    let block_comment =
        BLOCK_COMMENT.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment regex"));
    let single_quoted =
        SINGLE_QUOTED.get_or_init(|| Regex::new(r"'([^']*)'").expect("single quote regex"));
    let unquoted_key = UNQUOTED_KEY.get_or_init(|| {
        Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:").expect("unquoted key regex")
    });
    let trailing_comma =
        TRAILING_COMMA.get_or_init(|| Regex::new(r",\s*([}\]])").expect("trailing comma regex"));

    let mut fixed = block_comment.replace_all(text, "").to_string();
    fixed = line_comment.replace_all(&fixed, "").to_string();
    fixed = single_quoted.replace_all(&fixed, "\"$1\"").to_string();
    fixed = unquoted_key.replace_all(&fixed, "$1\"$2\":").to_string();
    fixed = trailing_comma.replace_all(&fixed, "$1").to_string();
    escape_control_chars_in_strings(&fixed)
}

/// Escape raw control characters occurring inside string literals.
fn escape_control_chars_in_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => {
                out.push(c);
                escaped = true;
            }
            '"' => {
                out.push(c);
                in_string = !in_string;
            }
            '\n' if in_string => out.push_str("\\n"),
            '\r' if in_string => out.push_str("\\r"),
            '\t' if in_string => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

fn index_list(text: &str, field: &str) -> Option<Vec<i64>> {
    let pattern = format!(r#""{field}"\s*:\s*\[([^\]]*)\]"#);
    let re = Regex::new(&pattern).ok()?;
    let capture = re.captures(text)?;
    let list = capture[1]
        .split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect();
    Some(list)
}

fn string_field(text: &str, field: &str) -> Option<String> {
    let pattern = format!(r#""{field}"\s*:\s*"([^"]*)"#);
    let re = Regex::new(&pattern).ok()?;
    Some(re.captures(text)?[1].to_string())
}

/// Last resort for grading responses: pull the three bucket lists out of the
/// raw text and rebuild a minimal single-scenario response.
fn extract_grading_fields(text: &str) -> Option<Value> {
    extract_single_grading_fields(text).map(|grading| {
        json!({
            "selected_scenarios": [merge_index(grading)],
            "overall_reasoning": "",
        })
    })
}

fn merge_index(mut grading: Value) -> Value {
    if let Some(object) = grading.as_object_mut() {
        object.insert("scenario_index".into(), json!(1));
    }
    grading
}

fn extract_single_grading_fields(text: &str) -> Option<Value> {
    let highly = index_list(text, "highly_recommended");
    let recommended = index_list(text, "recommended");
    let less = index_list(text, "less_recommended");
    if highly.is_none() && recommended.is_none() && less.is_none() {
        return None;
    }
    Some(json!({
        "recommendation_grades": {
            "highly_recommended": highly.unwrap_or_default(),
            "recommended": recommended.unwrap_or_default(),
            "less_recommended": less.unwrap_or_default(),
        },
        "comprehensive_score": 50.0,
        "scenario_reasoning": string_field(text, "scenario_reasoning").unwrap_or_default(),
        "grading_reasoning": string_field(text, "grading_reasoning").unwrap_or_default(),
        "final_choices": [],
    }))
}

fn extract_selection_fields(text: &str) -> Option<Value> {
    let pattern = r#""selected_scenario_ids"\s*:\s*\[([^\]]*)\]"#;
    static IDS: OnceLock<Regex> = OnceLock::new();
    let re = IDS.get_or_init(|| Regex::new(pattern).expect("selection ids regex"));
    let capture = re.captures(text)?;
    let ids: Vec<u64> = capture[1]
        .split(',')
        .filter_map(|part| part.trim().parse::<u64>().ok())
        .collect();
    if ids.is_empty() {
        return None;
    }
    Some(json!({
        "selected_scenario_ids": ids,
        "reasoning": string_field(text, "reasoning").unwrap_or_default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_block_respects_strings() {
        let text = r#"noise {"a": "brace } in string", "b": 1} trailing"#;
        let block = balanced_object(text).unwrap();
        assert_eq!(block, r#"{"a": "brace } in string", "b": 1}"#);
    }

    #[test]
    fn repair_fixes_trailing_commas_and_quotes() {
        let broken = r#"{'selected_scenario_ids': [1, 2,], reasoning: 'ok',}"#;
        let repaired = repair_json(broken);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["selected_scenario_ids"][0], 1);
        assert_eq!(value["reasoning"], "ok");
    }

    #[test]
    fn control_chars_inside_strings_are_escaped() {
        let broken = "{\"reasoning\": \"line one\nline two\"}";
        let repaired = repair_json(broken);
        let value: Value = serde_json::from_str(&repaired).unwrap();
        assert_eq!(value["reasoning"], "line one\nline two");
    }
}
