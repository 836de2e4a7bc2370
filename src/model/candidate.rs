//! Per-source therapy candidates and gene observations

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Category a candidate holds at one source.
///
/// `NotKnown` is a holding bucket for candidates the ranker could not place;
/// `Remove` marks candidates that must be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    FirstChoice,
    SecondChoice,
    AlternativeAntibiotic,
    NotKnown,
    Remove,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::FirstChoice => "first_choice",
            Category::SecondChoice => "second_choice",
            Category::AlternativeAntibiotic => "alternative_antibiotic",
            Category::NotKnown => "not_known",
            Category::Remove => "remove",
        }
    }

    /// Parses free-form category wording the way source texts and LLMs phrase it.
    pub fn parse_loose(raw: &str) -> Self {
        let value = raw.trim().to_lowercase().replace(['-', ' '], "_");
        match value.as_str() {
            "first_choice" | "first_line" | "firstline" | "first" | "preferred" | "primary"
            | "first_line_therapy" | "drug_of_choice" => Category::FirstChoice,
            "second_choice" | "second_line" | "secondline" | "second" | "backup"
            | "secondary" | "second_line_therapy" => Category::SecondChoice,
            "alternative_antibiotic" | "alternative" | "alternatives" | "alternate"
            | "salvage" | "last_resort" | "third_line" | "reserve" => {
                Category::AlternativeAntibiotic
            }
            "remove" | "removed" | "exclude" | "irrelevant" => Category::Remove,
            _ => Category::NotKnown,
        }
    }

    /// Weight in the category vote; `None` for categories that do not vote.
    pub fn vote_weight(&self) -> Option<u32> {
        match self {
            Category::FirstChoice => Some(4),
            Category::SecondChoice => Some(3),
            Category::AlternativeAntibiotic => Some(2),
            Category::NotKnown | Category::Remove => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One antibiotic recommendation attributed to one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapyCandidate {
    pub medical_name: String,
    pub coverage_for: Option<String>,
    pub route_of_administration: Option<String>,
    pub dose_duration: Option<String>,
    pub renal_adjustment: Option<String>,
    pub general_considerations: Option<String>,
    pub is_combined: bool,
    /// 1-based index of the source this candidate came from.
    pub source_index: usize,
    pub category: Category,
}

impl TherapyCandidate {
    pub fn new(medical_name: impl Into<String>, category: Category, source_index: usize) -> Self {
        Self {
            medical_name: medical_name.into(),
            coverage_for: None,
            route_of_administration: None,
            dose_duration: None,
            renal_adjustment: None,
            general_considerations: None,
            is_combined: false,
            source_index,
            category,
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route_of_administration = Some(route.into());
        self
    }

    pub fn with_dose(mut self, dose: impl Into<String>) -> Self {
        self.dose_duration = Some(dose.into());
        self
    }

    pub fn with_coverage(mut self, coverage: impl Into<String>) -> Self {
        self.coverage_for = Some(coverage.into());
        self
    }

    pub fn with_renal(mut self, renal: impl Into<String>) -> Self {
        self.renal_adjustment = Some(renal.into());
        self
    }

    pub fn with_considerations(mut self, notes: impl Into<String>) -> Self {
        self.general_considerations = Some(notes.into());
        self
    }

    /// Renders every known field on one line for ranking prompts.
    pub fn context_line(&self) -> String {
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "unknown".to_string());
        format!(
            "{} [category: {}] coverage: {}; route: {}; dose: {}; renal: {}; considerations: {}",
            self.medical_name,
            self.category,
            field(&self.coverage_for),
            field(&self.route_of_administration),
            field(&self.dose_duration),
            field(&self.renal_adjustment),
            field(&self.general_considerations),
        )
    }
}

/// A resistance gene mentioned by one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResistanceGeneObservation {
    pub gene_name: String,
    pub affected_classes: Option<String>,
    pub considerations: Option<String>,
    #[serde(skip)]
    pub source_index: usize,
}

/// Maps literal placeholders (`"null"`, `"none"`, `"not specified"`, blank) to `None`.
pub fn clean_null(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    match trimmed.to_lowercase().as_str() {
        "" | "null" | "none" | "n/a" | "na" | "not specified" | "not available" | "unknown" => {
            None
        }
        _ => Some(trimmed.to_string()),
    }
}

/// Normalises a stated route to IV, PO, IM or IV/PO. Other routes are kept verbatim.
pub fn normalize_route(route: &str) -> String {
    let lowered = route.trim().to_lowercase();
    let tokens: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let has = |words: &[&str]| tokens.iter().any(|t| words.contains(t));

    let iv = has(&["iv", "intravenous", "intravenously"]);
    let po = has(&["po", "oral", "orally", "mouth"]);
    let im = has(&["im", "intramuscular", "intramuscularly"]);

    let normalized = match (iv, po, im) {
        (true, true, _) => "IV/PO",
        (true, false, false) => "IV",
        (false, true, false) => "PO",
        (false, false, true) => "IM",
        _ => return route.trim().to_string(),
    };
    normalized.to_string()
}

/// Returns true for routes that act systemically.
pub fn is_systemic_route(route: &str) -> bool {
    matches!(normalize_route(route).as_str(), "IV" | "PO" | "IM" | "IV/PO")
}

fn frequency_rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            (r"(?i)\b(bid|b\.i\.d\.?|twice daily|twice a day)", "q12h"),
            (r"(?i)\b(tid|t\.i\.d\.?|three times daily|three times a day)", "q8h"),
            (r"(?i)\b(qid|q\.i\.d\.?|four times daily|four times a day)", "q6h"),
            (r"(?i)\b(qd|q\.d\.?|once daily|once a day|daily)\b", "q24h"),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| {
            Regex::new(pattern).ok().map(|re| (re, replacement))
        })
        .collect()
    })
}

/// Rewrites frequency words in a dose string to the `qNh` form.
pub fn normalize_frequency(dose: &str) -> String {
    frequency_rules()
        .iter()
        .fold(dose.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}
