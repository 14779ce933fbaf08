use serde::{Deserialize, Serialize};

/// A clinical scenario: the underlying item every retriever resolves to.
///
/// Attribute fields are free text as authored in the source corpus; the
/// alias tables are responsible for resolving them to canonical categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Stable identity across all retrieval sources.
    pub id: u64,
    /// Scenario description (the text the keyword corpus indexes).
    pub description: String,
    /// Domain tag used by the domain-affinity filter (panel/department).
    pub department: String,
    /// Clinical topic, if the corpus provides one.
    pub topic: Option<String>,
    /// Target age group ("adult", "18-65", ...).
    pub age_group: Option<String>,
    /// Target sex, if restricted.
    pub sex: Option<String>,
    /// Target pregnancy status, if restricted.
    pub pregnancy_status: Option<String>,
    /// Urgency level the scenario addresses.
    pub urgency: Option<String>,
    /// Patient population note.
    pub population: Option<String>,
}

/// A procedure recommendation attached to a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubItem {
    /// Procedure name.
    pub name: String,
    /// Imaging modality ("CT", "MRI", ...).
    pub modality: Option<String>,
    /// Ordinal appropriateness rating, 1–9. Drives the rule-based grading
    /// fallback.
    pub rating: u8,
    /// Radiation exposure level ("none", "low", "medium", "high").
    pub radiation_level: Option<String>,
    /// Pregnancy-safety note; "contraindicated" marks a hard safety flag.
    pub pregnancy_safety: Option<String>,
    /// Known contraindications, if any.
    pub contraindications: Option<String>,
    /// Evidence level backing the recommendation.
    pub evidence_level: Option<String>,
}

impl SubItem {
    /// Minimal constructor for the common case; optional detail fields start
    /// empty.
    pub fn new(name: impl Into<String>, rating: u8) -> Self {
        Self {
            name: name.into(),
            modality: None,
            rating,
            radiation_level: None,
            pregnancy_safety: None,
            contraindications: None,
            evidence_level: None,
        }
    }
}
