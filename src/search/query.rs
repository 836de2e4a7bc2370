//! Evidence search query construction

use crate::model::{join_human, InputParameters};

/// Clinical condition implied by a sample panel.
pub fn panel_condition(panel: &str) -> String {
    let condition = match panel.trim() {
        "Blood" => "bacteremia or sepsis",
        "Urine" | "UTI" => "UTI or urinary tract infection",
        "Sputum" | "Respiratory" => "pneumonia or respiratory infection",
        "CSF" => "meningitis",
        "Wound" => "wound infection",
        "Nail" => "onychomycosis or tinea unguium",
        "Skin" => "skin infection or dermatitis",
        "Vaginal" => "vaginitis or vaginal infection",
        "RESPIRATORY TRACT PANEL (RPP)" => "respiratory tract infection or pneumonia",
        "FUNGAL, SEPSIS & WOUND PANEL" => "fungal infection or sepsis or wound infection",
        "SEXUALLY TRANSMITTED INFECTION PANEL (STI)" => "sexually transmitted infection or STI",
        "HELICOBACTER PYLORI" => "Helicobacter pylori or H. pylori or peptic ulcer",
        "GASTROENTERITIS PANEL" => "gastroenteritis or gastrointestinal infection",
        "Womens Health Panel (Vaginosis)" => {
            "bacterial vaginosis or vaginitis or vaginal infection"
        }
        other => return other.to_lowercase(),
    };
    condition.to_string()
}

fn icd_phrase(params: &InputParameters) -> String {
    let described: Vec<String> = match &params.icd_transformation {
        Some(icd) if !icd.code_names.is_empty() => icd
            .code_names
            .iter()
            .filter(|c| !c.code.trim().is_empty())
            .map(|c| match c.name.as_deref() {
                Some(name) if !name.is_empty() && name != c.code => {
                    format!("{} ({})", c.code, name)
                }
                _ => c.code.clone(),
            })
            .collect(),
        _ => params.severity_codes.clone(),
    };

    if described.is_empty() {
        String::new()
    } else {
        format!(" for patient with ICD-10 codes {}", described.join(", "))
    }
}

/// Builds the evidence search query for a patient context.
pub fn build_search_query(params: &InputParameters) -> String {
    let resistance = if params.resistant_genes.is_empty() {
        String::new()
    } else {
        format!(" with {} resistance", join_human(&params.resistant_genes))
    };

    let condition = match params.panel.as_deref().map(str::trim) {
        Some(panel) if !panel.is_empty() && panel != "N/A" && panel != "Not specified" => {
            format!(" for {}", panel_condition(panel))
        }
        _ => String::new(),
    };

    format!(
        "Evidence-based antibiotic dosing regimens for {}{}{}, specifying drug names, dosing, dosing frequency, route of administration, and treatment duration, with brief antimicrobial stewardship considerations{}",
        params.pathogen_display(),
        resistance,
        condition,
        icd_phrase(params)
    )
}
