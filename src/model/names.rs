//! Drug name identity and canonicalisation
//!
//! Every lookup that compares drug names (ranking match-back, grouping,
//! memoisation) goes through [`normalize_name`]. [`canonical_medical_name`]
//! is the display-side counterpart applied once, right after extraction.

use regex::Regex;
use std::sync::OnceLock;

/// Dash-like code points that collapse to an ASCII hyphen.
const DASH_VARIANTS: &[char] = &[
    '\u{2010}', '\u{2011}', '\u{2012}', '\u{2013}', '\u{2014}', '\u{2015}', '\u{2212}',
    '\u{FE58}', '\u{FE63}', '\u{FF0D}',
];

/// Formulation words that are not part of a drug's identity.
const FORMULATION_WORDS: &[&str] = &[
    "gel",
    "cream",
    "ointment",
    "solution",
    "suspension",
    "tablet",
    "tablets",
    "capsule",
    "capsules",
    "injection",
    "infusion",
    "powder",
    "syrup",
    "drops",
];

/// Abbreviations that name well-known combinations.
const COMBINATION_ALIASES: &[(&str, &str)] = &[
    ("tmp/smx", "Trimethoprim plus Sulfamethoxazole"),
    ("tmp-smx", "Trimethoprim plus Sulfamethoxazole"),
    ("tmp smx", "Trimethoprim plus Sulfamethoxazole"),
    ("sxt", "Trimethoprim plus Sulfamethoxazole"),
    ("co-trimoxazole", "Trimethoprim plus Sulfamethoxazole"),
    ("cotrimoxazole", "Trimethoprim plus Sulfamethoxazole"),
    ("trimethoprim-sulfamethoxazole", "Trimethoprim plus Sulfamethoxazole"),
    ("pip/tazo", "Piperacillin plus Tazobactam"),
    ("pip-tazo", "Piperacillin plus Tazobactam"),
    ("piperacillin-tazobactam", "Piperacillin plus Tazobactam"),
    ("amox/clav", "Amoxicillin plus Clavulanate"),
    ("amoxicillin-clavulanate", "Amoxicillin plus Clavulanate"),
    ("co-amoxiclav", "Amoxicillin plus Clavulanate"),
    ("ampicillin-sulbactam", "Ampicillin plus Sulbactam"),
    ("quinupristin-dalfopristin", "Quinupristin plus Dalfopristin"),
];

/// Identity key for a drug or gene name.
///
/// Lowercases, trims, and collapses every dash variant to `-`. Two names are the
/// same entity iff their keys are equal.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if DASH_VARIANTS.contains(&c) { '-' } else { c })
        .collect::<String>()
        .to_lowercase()
}

/// Returns true if the canonical name denotes a combination product.
pub fn is_combination(name: &str) -> bool {
    name.to_lowercase().contains(" plus ")
}

fn separator_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\s*/\s*|\s+\+\s+|\s+and\s+|\s+with\s+|\s+plus\s+")
            .expect("valid regex")
    })
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

fn title_case_drug(part: &str) -> String {
    part.split_whitespace()
        .map(|w| {
            // Keep short all-caps tokens such as "G" in "Penicillin G"
            if w.len() <= 2 && w.chars().all(|c| c.is_ascii_uppercase()) {
                w.to_string()
            } else {
                w.split('-').map(title_case).collect::<Vec<_>>().join("-")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn strip_formulation(part: &str) -> String {
    part.split_whitespace()
        .filter(|w| !FORMULATION_WORDS.contains(&w.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_hyphen_combination(part: &str) -> Vec<String> {
    let pieces: Vec<&str> = part.split('-').map(str::trim).collect();
    if pieces.len() == 2 && pieces.iter().all(|p| p.len() >= 4 && !p.contains(' ')) {
        pieces.into_iter().map(str::to_string).collect()
    } else {
        vec![part.to_string()]
    }
}

/// Canonical display name: formulation words stripped, combinations rewritten to
/// `"Drug1 plus Drug2"`, known abbreviations expanded, title case.
pub fn canonical_medical_name(raw: &str) -> String {
    let dashed: String = raw
        .trim()
        .chars()
        .map(|c| if DASH_VARIANTS.contains(&c) { '-' } else { c })
        .collect();
    let lowered = dashed.to_lowercase();

    for (alias, canonical) in COMBINATION_ALIASES {
        if lowered == *alias || strip_formulation(&lowered) == *alias {
            return canonical.to_string();
        }
    }

    let parts: Vec<String> = separator_regex()
        .split(&dashed)
        .flat_map(split_hyphen_combination)
        .map(|p| strip_formulation(&p))
        .filter(|p| !p.is_empty())
        .map(|p| title_case_drug(&p))
        .collect();

    if parts.is_empty() {
        return dashed.trim().to_string();
    }
    parts.join(" plus ")
}
