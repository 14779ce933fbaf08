//! Alias tables for structured-attribute matching.
//!
//! Each table maps a canonical category to the synonyms, abbreviations, and
//! variants seen in corpus text and caller input. Tables are `const` data,
//! read-only after initialization, and safely shared across all concurrent
//! readers.

/// Canonical category for "no restriction". Matches any patient value.
pub const UNRESTRICTED: &str = "unrestricted";

/// A canonical-category → aliases table.
pub struct AliasTable {
    entries: &'static [(&'static str, &'static [&'static str])],
}

impl AliasTable {
    /// Resolve a raw value to its canonical category by exact
    /// (case-insensitive, trimmed) alias match.
    pub fn resolve(&self, value: &str) -> Option<&'static str> {
        let needle = value.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        for (canonical, aliases) in self.entries {
            if *canonical == needle || aliases.iter().any(|a| *a == needle) {
                return Some(canonical);
            }
        }
        None
    }

    /// Resolve by containment: the first canonical category any of whose
    /// aliases occurs inside `text` as a whole word. Used for attribute
    /// extraction from free-text descriptions.
    pub fn resolve_in_text(&self, text: &str) -> Option<&'static str> {
        let haystack = text.to_lowercase();
        if haystack.is_empty() {
            return None;
        }
        for (canonical, aliases) in self.entries {
            if aliases.iter().any(|a| contains_word(&haystack, a)) {
                return Some(canonical);
            }
        }
        None
    }

    /// Match a patient value against a scenario requirement.
    ///
    /// 1.0 when both resolve to the same category or the requirement is
    /// unrestricted; 0.8 on raw substring containment; 0.0 otherwise.
    pub fn match_score(&self, patient_value: &str, scenario_value: &str) -> f64 {
        let patient = self.resolve(patient_value);
        let scenario = self.resolve(scenario_value);

        match (patient, scenario) {
            (_, Some(UNRESTRICTED)) => 1.0,
            // Both resolved: categories either agree or genuinely conflict.
            (Some(p), Some(s)) => {
                if p == s {
                    1.0
                } else {
                    0.0
                }
            }
            // At least one side unrecognized: fall back to raw containment.
            _ => {
                let p = patient_value.trim().to_lowercase();
                let s = scenario_value.trim().to_lowercase();
                if !p.is_empty() && !s.is_empty() && (p.contains(&s) || s.contains(&p)) {
                    0.8
                } else {
                    0.0
                }
            }
        }
    }
}

/// Whole-word containment: `needle` occurs in `haystack` with no
/// alphanumeric character adjacent on either side. Both must already be
/// lowercase.
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        if before_ok && after_ok {
            return true;
        }
        from = end;
    }
    false
}

const SEX_ENTRIES: &[(&str, &[&str])] = &[
    (
        "male",
        &["male", "m", "man", "men", "boy", "gentleman", "male patient"],
    ),
    (
        "female",
        &["female", "f", "woman", "women", "girl", "lady", "female patient"],
    ),
    (
        UNRESTRICTED,
        &["unrestricted", "any", "all", "both", "either", "male or female", "adult", "adults"],
    ),
];

const PREGNANCY_ENTRIES: &[(&str, &[&str])] = &[
    (
        "pregnant",
        &[
            "pregnant", "pregnancy", "gravid", "gestation", "gestational", "prenatal",
            "antenatal", "expecting", "first trimester", "second trimester", "third trimester",
        ],
    ),
    (
        "not-pregnant",
        &[
            "not pregnant", "non-pregnant", "nonpregnant", "non-gestational", "not expecting",
        ],
    ),
    (
        "lactating",
        &["lactating", "lactation", "breastfeeding", "nursing"],
    ),
    (
        "preconception",
        &["preconception", "pre-pregnancy", "trying to conceive", "fertility workup"],
    ),
    (
        "postpartum",
        &["postpartum", "post-partum", "postnatal", "after delivery", "puerperium"],
    ),
    (
        "infertility",
        &["infertility", "infertile", "sterility", "subfertility"],
    ),
    (UNRESTRICTED, &["unrestricted", "any", "all", "both", "either"]),
];

const DEPARTMENT_ENTRIES: &[(&str, &[&str])] = &[
    (
        "cardiology",
        &["cardiology", "cardiac", "cardiovascular", "cards", "heart"],
    ),
    (
        "gastroenterology",
        &["gastroenterology", "gastrointestinal", "gi", "digestive"],
    ),
    (
        "neurology",
        &["neurology", "neurologic", "neuro", "nervous system"],
    ),
    (
        "orthopedics",
        &["orthopedics", "orthopaedics", "ortho", "musculoskeletal", "msk"],
    ),
    ("pediatrics", &["pediatrics", "paediatrics", "peds", "pediatric"]),
    (
        "obstetrics-gynecology",
        &["obstetrics", "gynecology", "gynaecology", "ob/gyn", "obgyn", "ob-gyn", "women's health"],
    ),
    (
        "emergency",
        &["emergency", "emergency medicine", "er", "ed", "a&e", "casualty"],
    ),
    ("oncology", &["oncology", "oncologic", "cancer care", "onc"]),
    (
        "pulmonology",
        &["pulmonology", "respiratory", "pulmonary", "thoracic", "chest medicine"],
    ),
    ("urology", &["urology", "urologic", "genitourinary", "gu"]),
    (UNRESTRICTED, &["unrestricted", "any", "all", "general"]),
];

const URGENCY_ENTRIES: &[(&str, &[&str])] = &[
    (
        "life-threatening",
        &["life-threatening", "life threatening", "critical condition"],
    ),
    (
        "emergent",
        &["emergent", "emergency", "urgent", "acute", "critical", "stat"],
    ),
    ("severe", &["severe", "serious"]),
    ("moderate", &["moderate", "intermediate"]),
    ("subacute", &["subacute", "sub-acute"]),
    ("recurrent", &["recurrent", "recurring", "relapse", "relapsing"]),
    ("routine", &["routine", "chronic", "non-urgent", "nonurgent"]),
    ("mild", &["mild", "minor", "slight"]),
    ("stable", &["stable"]),
    ("unstable", &["unstable"]),
    ("elective", &["elective", "scheduled"]),
    ("preventive", &["preventive", "preventative", "prophylactic"]),
    ("screening", &["screening", "screen"]),
    ("follow-up", &["follow-up", "followup", "surveillance"]),
    ("end-stage", &["end-stage", "terminal", "late-stage"]),
    ("palliative", &["palliative", "comfort care"]),
    (UNRESTRICTED, &["unrestricted", "any", "all"]),
];

static SEX_TABLE: AliasTable = AliasTable { entries: SEX_ENTRIES };
static PREGNANCY_TABLE: AliasTable = AliasTable { entries: PREGNANCY_ENTRIES };
static DEPARTMENT_TABLE: AliasTable = AliasTable { entries: DEPARTMENT_ENTRIES };
static URGENCY_TABLE: AliasTable = AliasTable { entries: URGENCY_ENTRIES };

pub fn sex_table() -> &'static AliasTable {
    &SEX_TABLE
}

pub fn pregnancy_table() -> &'static AliasTable {
    &PREGNANCY_TABLE
}

pub fn department_table() -> &'static AliasTable {
    &DEPARTMENT_TABLE
}

pub fn urgency_table() -> &'static AliasTable {
    &URGENCY_TABLE
}

/// Named age groups with their year ranges.
const AGE_GROUPS: &[(&str, &[&str], (u32, u32))] = &[
    ("neonate", &["neonate", "newborn", "neonatal"], (0, 1)),
    ("infant", &["infant", "baby", "infancy"], (0, 2)),
    ("toddler", &["toddler", "preschool"], (2, 5)),
    ("child", &["child", "children", "school-age", "school age"], (6, 12)),
    (
        "adolescent",
        &["adolescent", "teenager", "teen", "puberty", "juvenile"],
        (12, 18),
    ),
    ("young-adult", &["young adult", "young"], (18, 40)),
    ("adult", &["adult", "adults", "grown-up"], (18, 65)),
    ("middle-aged", &["middle-aged", "middle aged", "midlife"], (40, 65)),
    (
        "elderly",
        &["elderly", "older adult", "geriatric", "senior", "aged"],
        (65, 150),
    ),
];

/// Parse an explicit numeric age range ("18-65", "40 to 65") out of text.
/// Returns the first range found.
pub fn parse_age_range(text: &str) -> Option<(u32, u32)> {
    let lowered = text.to_lowercase();
    let bytes = lowered.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let low: u32 = lowered[start..i].parse().ok()?;
            // Accept "-", "–", "~", or " to " as the range separator.
            let rest = &lowered[i..];
            let sep_len = if rest.starts_with('-') || rest.starts_with('~') {
                1
            } else if rest.starts_with('–') {
                '–'.len_utf8()
            } else if rest.starts_with(" to ") {
                4
            } else {
                i += 1;
                continue;
            };
            let after = &lowered[i + sep_len..];
            let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
            if let Ok(high) = digits.parse::<u32>() {
                if low <= high {
                    return Some((low, high));
                }
            }
            i += sep_len;
        } else {
            i += 1;
        }
    }
    None
}

/// Score a patient age against a scenario's age text (age group field plus
/// description).
///
/// Exact range or group hit → 1.0; within 2 years of a boundary → 0.7;
/// named group or range present but missed → 0.3; unrestricted → 1.0;
/// nothing recognizable → 0.0 (excluded from averaging upstream).
pub fn match_age(patient_age: u32, scenario_text: &str) -> f64 {
    let lowered = scenario_text.to_lowercase();
    if lowered.is_empty() {
        return 0.0;
    }
    if ["unrestricted", "any age", "all ages"]
        .iter()
        .any(|kw| lowered.contains(kw))
    {
        return 1.0;
    }

    if let Some((low, high)) = parse_age_range(&lowered) {
        return range_score(patient_age, low, high);
    }

    for (_, aliases, (low, high)) in AGE_GROUPS {
        if aliases.iter().any(|a| lowered.contains(a)) {
            return range_score(patient_age, *low, *high);
        }
    }

    0.0
}

fn range_score(age: u32, low: u32, high: u32) -> f64 {
    if (low..=high).contains(&age) {
        1.0
    } else if age.abs_diff(low) <= 2 || age.abs_diff(high) <= 2 {
        0.7
    } else {
        0.3
    }
}
