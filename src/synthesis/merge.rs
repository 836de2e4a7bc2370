//! Deterministic field-level merge rules
//!
//! Used directly when LLM unification fails or returns nothing, and as the
//! reference for what a merged value may contain: every merged value is drawn
//! from the members' own values.

use crate::model::{clean_null, normalize_route, Field, TherapyCandidate, UnifiedEntry};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const NO_RENAL_ADJUSTMENT: &str = "No Renal Adjustment";

/// The five content fields of a candidate or entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldValues {
    /// Specific indication, e.g. "MRSA bacteremia"
    pub coverage_for: Option<String>,
    /// One of IV, PO, IM, IV/PO
    pub route_of_administration: Option<String>,
    /// "dose,route,frequency,duration"
    pub dose_duration: Option<String>,
    /// CrCl threshold statement or "No Renal Adjustment"
    pub renal_adjustment: Option<String>,
    /// Clinical notes separated by semicolons
    pub general_considerations: Option<String>,
}

impl FieldValues {
    pub fn from_candidate(c: &TherapyCandidate) -> Self {
        Self {
            coverage_for: c.coverage_for.clone(),
            route_of_administration: c.route_of_administration.clone(),
            dose_duration: c.dose_duration.clone(),
            renal_adjustment: c.renal_adjustment.clone(),
            general_considerations: c.general_considerations.clone(),
        }
    }

    pub fn from_entry(e: &UnifiedEntry) -> Self {
        Self {
            coverage_for: e.coverage_for.clone(),
            route_of_administration: e.route_of_administration.clone(),
            dose_duration: e.dose_duration.clone(),
            renal_adjustment: e.renal_adjustment.clone(),
            general_considerations: e.general_considerations.clone(),
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::CoverageFor => self.coverage_for.as_deref(),
            Field::RouteOfAdministration => self.route_of_administration.as_deref(),
            Field::DoseDuration => self.dose_duration.as_deref(),
            Field::RenalAdjustment => self.renal_adjustment.as_deref(),
            Field::GeneralConsiderations => self.general_considerations.as_deref(),
        }
    }

    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::CoverageFor => &mut self.coverage_for,
            Field::RouteOfAdministration => &mut self.route_of_administration,
            Field::DoseDuration => &mut self.dose_duration,
            Field::RenalAdjustment => &mut self.renal_adjustment,
            Field::GeneralConsiderations => &mut self.general_considerations,
        }
    }

    /// Writes all five fields onto `entry` and refreshes its completeness.
    pub fn apply_to(&self, entry: &mut UnifiedEntry) {
        for field in Field::ALL {
            entry.set(field, self.get(field).map(str::to_string));
        }
        entry.refresh_completeness();
    }

    /// Placeholder strings become `None`; routes are normalised.
    pub fn cleaned(mut self) -> Self {
        for field in Field::ALL {
            let slot = self.slot(field);
            *slot = clean_null(slot.take());
        }
        self.route_of_administration = self
            .route_of_administration
            .map(|r| normalize_route(&r));
        self
    }

    /// Nulls every field that all `members` left null.
    pub fn guarded_by(mut self, members: &[FieldValues]) -> Self {
        for field in Field::ALL {
            if members.iter().all(|m| m.get(field).is_none()) {
                *self.slot(field) = None;
            }
        }
        self
    }
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

fn dose_amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)\d+(\.\d+)?\s*(mg|g|mcg|µg|units?|iu|mu|million units)\b")
}

fn frequency_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)\bq\s?\d+\s?h\b|every\s+\d+\s*(-\s*\d+\s*)?hours?|\b(once|twice|daily|bid|tid|qid|qd)\b|single dose",
    )
}

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?i)\d+\s*(-|to)?\s*\d*\s*(days?|weeks?|wks?|months?|d)\b",
    )
}

fn renal_threshold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)(crcl|creatinine clearance|e?gfr|clcr)[^;]*?\d+")
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\d+(\.\d+)?")
}

/// How many of dose amount, frequency and duration a regimen states.
pub fn dose_completeness(dose: &str) -> usize {
    [dose_amount_re(), frequency_re(), duration_re()]
        .iter()
        .filter(|re| re.is_match(dose))
        .count()
}

fn present<'a>(values: &'a [Option<&'a str>]) -> impl Iterator<Item = &'a str> + 'a {
    values
        .iter()
        .flatten()
        .copied()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Union of stated routes; IV together with PO collapses to "IV/PO".
pub fn merge_routes(values: &[Option<&str>]) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for route in present(values) {
        let normalized = normalize_route(route);
        for part in normalized.split('/') {
            let part = part.trim().to_string();
            if !part.is_empty() && !parts.contains(&part) {
                parts.push(part);
            }
        }
    }

    let has = |p: &str| parts.iter().any(|x| x == p);
    if has("IV") && has("PO") {
        return Some("IV/PO".to_string());
    }
    match parts.len() {
        0 => None,
        _ => Some(parts.join("/")),
    }
}

/// The single most complete regimen; ties keep the earliest member.
pub fn pick_dose(values: &[Option<&str>]) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for dose in present(values) {
        let score = dose_completeness(dose);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((dose, score));
        }
    }
    best.map(|(d, _)| d.to_string())
}

fn is_no_adjustment(value: &str) -> bool {
    let lowered = value.trim().to_lowercase();
    lowered == "no renal adjustment" || lowered == "no renal adjustment needed"
        || lowered == "no renal adjustment required"
}

/// "No Renal Adjustment" when every member says so, else the most specific
/// numeric threshold statement.
pub fn pick_renal(values: &[Option<&str>]) -> Option<String> {
    let stated: Vec<&str> = present(values).collect();
    if stated.is_empty() {
        return None;
    }
    if stated.iter().all(|v| is_no_adjustment(v)) {
        return Some(NO_RENAL_ADJUSTMENT.to_string());
    }

    let specific = stated
        .iter()
        .filter(|v| renal_threshold_re().is_match(v))
        .fold(None::<(&str, usize)>, |best, v| {
            let numbers = number_re().find_iter(v).count();
            match best {
                Some((_, n)) if n >= numbers => best,
                _ => Some((v, numbers)),
            }
        });

    match specific {
        Some((v, _)) => Some(v.to_string()),
        None => stated
            .iter()
            .find(|v| !is_no_adjustment(v))
            .map(|v| v.to_string()),
    }
}

/// Distinct notes joined with "; ". With a cap, whole notes are added while they fit.
pub fn merge_considerations(values: &[Option<&str>], cap: Option<usize>) -> Option<String> {
    let mut notes: Vec<&str> = Vec::new();
    for value in present(values) {
        for note in value.split(';').map(str::trim).filter(|n| !n.is_empty()) {
            if !notes.contains(&note) {
                notes.push(note);
            }
        }
    }
    if notes.is_empty() {
        return None;
    }

    let joined = match cap {
        None => notes.join("; "),
        Some(cap) => {
            let mut out = String::new();
            for note in notes {
                let extra = if out.is_empty() { note.len() } else { note.len() + 2 };
                if out.len() + extra > cap {
                    if out.is_empty() {
                        out = truncate_chars(note, cap);
                    }
                    break;
                }
                if !out.is_empty() {
                    out.push_str("; ");
                }
                out.push_str(note);
            }
            out
        }
    };
    Some(joined)
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Applies every merge rule across `members`.
pub fn merge_field_values(members: &[FieldValues]) -> FieldValues {
    let column = |field: Field| -> Vec<Option<&str>> { members.iter().map(|m| m.get(field)).collect() };

    FieldValues {
        coverage_for: present(&column(Field::CoverageFor)).next().map(str::to_string),
        route_of_administration: merge_routes(&column(Field::RouteOfAdministration)),
        dose_duration: pick_dose(&column(Field::DoseDuration)),
        renal_adjustment: pick_renal(&column(Field::RenalAdjustment)),
        general_considerations: merge_considerations(&column(Field::GeneralConsiderations), None),
    }
}
