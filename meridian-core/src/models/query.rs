use serde::{Deserialize, Serialize};

use crate::aliases;

/// Structured patient attributes supplied with a recommendation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientProfile {
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub pregnancy_status: Option<String>,
    pub allergies: Vec<String>,
    pub comorbidities: Vec<String>,
}

/// Clinical context for a recommendation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalContext {
    /// Requesting department; drives the domain-affinity filter.
    pub department: String,
    /// Free-text chief complaint / symptoms.
    pub chief_complaint: String,
    /// Symptom severity / urgency descriptor.
    pub urgency: Option<String>,
    pub symptom_duration: Option<String>,
    pub medical_history: Option<String>,
    pub present_illness: Option<String>,
    pub diagnosis: Option<String>,
}

/// Immutable input to a single retrieval request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendQuery {
    pub patient: PatientProfile,
    pub clinical: ClinicalContext,
}

impl RecommendQuery {
    /// Build the standardized retrieval query text: age, sex, pregnancy
    /// status, chief complaint. Pregnancy status is omitted for male
    /// patients; it carries no signal there and pollutes the keyword set.
    pub fn standardized_text(&self) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(4);
        if let Some(age) = self.patient.age {
            parts.push(format!("{age} year old"));
        }
        let is_male = self
            .patient
            .sex
            .as_deref()
            .and_then(|s| aliases::sex_table().resolve(s))
            .map(|canonical| canonical == "male")
            .unwrap_or(false);
        if let Some(sex) = &self.patient.sex {
            parts.push(sex.clone());
        }
        if !is_male {
            if let Some(status) = &self.patient.pregnancy_status {
                parts.push(status.clone());
            }
        }
        if !self.clinical.chief_complaint.is_empty() {
            parts.push(self.clinical.chief_complaint.clone());
        }
        parts.join(", ")
    }
}
