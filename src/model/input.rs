//! Patient context and source documents

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pathogen {
    pub pathogen_name: String,
    #[serde(default)]
    pub pathogen_count: Option<String>,
}

/// One ICD code with its resolved description, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcdCodeName {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// ICD resolution result. Threaded through to the output untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IcdTransformation {
    #[serde(default)]
    pub code_names: Vec<IcdCodeName>,
    #[serde(default)]
    pub severity_codes_transformed: Option<String>,
}

/// Patient context for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputParameters {
    #[serde(default)]
    pub pathogens: Vec<Pathogen>,
    #[serde(default)]
    pub resistant_genes: Vec<String>,
    #[serde(default)]
    pub severity_codes: Vec<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub panel: Option<String>,
    #[serde(default)]
    pub systemic: Option<bool>,
    #[serde(default)]
    pub allergy: Option<Vec<String>>,
    #[serde(default)]
    pub icd_transformation: Option<IcdTransformation>,
    #[serde(default)]
    pub negative_organisms: Vec<String>,
    #[serde(default)]
    pub negative_resistance_genes: Vec<String>,
}

/// Joins items as "a", "a and b", or "a, b, and c".
pub fn join_human(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{} and {}", first, second),
        [rest @ .., last] => format!("{}, and {}", rest.join(", "), last),
    }
}

impl InputParameters {
    pub fn pathogen_names(&self) -> Vec<String> {
        self.pathogens
            .iter()
            .map(|p| p.pathogen_name.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect()
    }

    pub fn pathogen_display(&self) -> String {
        join_human(&self.pathogen_names())
    }

    pub fn genes_display(&self) -> String {
        if self.resistant_genes.is_empty() {
            "unknown".to_string()
        } else {
            join_human(&self.resistant_genes)
        }
    }

    /// ICD codes, rendered as "CODE (name)" where a description is known.
    pub fn severity_display(&self) -> String {
        if self.severity_codes.is_empty() {
            return "not specified".to_string();
        }
        let described: Vec<String> = self
            .severity_codes
            .iter()
            .map(|code| match self.icd_name(code) {
                Some(name) => format!("{} ({})", code, name),
                None => code.clone(),
            })
            .collect();
        join_human(&described)
    }

    fn icd_name(&self, code: &str) -> Option<&str> {
        self.icd_transformation
            .as_ref()?
            .code_names
            .iter()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .and_then(|c| c.name.as_deref())
    }

    pub fn allergy_display(&self) -> String {
        match &self.allergy {
            Some(list) if !list.is_empty() => join_human(list),
            _ => "none reported".to_string(),
        }
    }

    pub fn age_display(&self) -> String {
        self.age
            .map(|a| format!("{} years", a))
            .unwrap_or_else(|| "not specified".to_string())
    }

    pub fn panel_display(&self) -> String {
        self.panel.clone().unwrap_or_else(|| "not specified".to_string())
    }

    pub fn systemic_display(&self) -> &'static str {
        match self.systemic {
            Some(true) => "systemic therapy required (IV, PO or IM routes only)",
            Some(false) => "non-systemic therapy requested (exclude IV, PO and IM routes)",
            None => "no route restriction",
        }
    }

    /// Patient context block shared by every prompt.
    pub fn prompt_context(&self) -> String {
        format!(
            "Pathogen(s): {}\nResistance gene(s): {}\nICD-10 diagnosis: {}\nPatient age: {}\nSample/panel: {}\nAllergies (exclude these drugs and their class): {}\nRoute requirement: {}",
            self.pathogen_display(),
            self.genes_display(),
            self.severity_display(),
            self.age_display(),
            self.panel_display(),
            self.allergy_display(),
            self.systemic_display(),
        )
    }
}

/// One evidence source. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub url: String,
    pub title: String,
    pub raw_text: String,
}

impl SourceDocument {
    pub fn new(url: impl Into<String>, title: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Stable short id derived from title and text.
    pub fn content_id(&self) -> String {
        let digest = md5::compute(format!("{}|{}", self.title, self.raw_text));
        format!("{:x}", digest)[..8].to_string()
    }

    pub fn render(&self) -> String {
        format!(
            "Title: {}\nContent: {}\n[ID: {}]",
            self.title,
            self.raw_text,
            self.content_id()
        )
    }
}
