//! Accumulating per-chunk extractions into one set of field values

use crate::model::{normalize_frequency, Field};
use crate::synthesis::{merge_considerations, truncate_chars, FieldValues};
use regex::Regex;
use std::sync::OnceLock;

pub const DEFAULT_CONSIDERATIONS_CAP: usize = 300;
pub const DEFAULT_SAFETY_NOTE: &str = "Monitor for adverse effects and clinical response; review drug interactions and allergies before administration.";

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:(?:-|\u{2013}|\u{2014}|\u{2212}|to)\s*\d+(?:\.\d+)?\s*)?(days?|d\b|weeks?|wks?|months?)")
            .expect("valid regex")
    })
}

/// Treatment duration stated in a dose string, in days. Ranges use their lower bound.
pub fn duration_days(dose: &str) -> Option<f64> {
    let caps = duration_re().captures(dose)?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_lowercase();
    let factor = if unit.starts_with('w') {
        7.0
    } else if unit.starts_with('m') {
        30.0
    } else {
        1.0
    };
    Some(amount * factor)
}

/// Running merge of chunk extractions for one entry.
///
/// Only the fields missing when enrichment started are accepted. Dose keeps
/// the shortest stated duration, considerations accumulate up to `cap`
/// characters, and every other field takes the latest chunk's value.
#[derive(Debug, Clone)]
pub struct FieldAccumulator {
    wanted: Vec<Field>,
    values: FieldValues,
    cap: usize,
}

impl FieldAccumulator {
    pub fn new(wanted: Vec<Field>, cap: usize) -> Self {
        Self {
            wanted,
            values: FieldValues::default(),
            cap,
        }
    }

    pub fn wanted(&self) -> &[Field] {
        &self.wanted
    }

    /// Fields to ask the next chunk for. Dose stays requested so shorter
    /// courses in later chunks can still replace it.
    pub fn to_request(&self) -> Vec<Field> {
        self.wanted
            .iter()
            .copied()
            .filter(|f| *f == Field::DoseDuration || self.values.get(*f).is_none())
            .collect()
    }

    pub fn absorb(&mut self, chunk: FieldValues) {
        let chunk = chunk.cleaned();
        for field in self.wanted.clone() {
            let Some(new) = chunk.get(field).map(str::to_string) else {
                continue;
            };
            match field {
                Field::DoseDuration => {
                    let new = normalize_frequency(&new);
                    let replace = match self.values.dose_duration.as_deref() {
                        None => true,
                        Some(current) => match (duration_days(&new), duration_days(current)) {
                            (Some(n), Some(c)) => n < c,
                            (Some(_), None) => true,
                            (None, Some(_)) => false,
                            (None, None) => true,
                        },
                    };
                    if replace {
                        self.values.dose_duration = Some(new);
                    }
                }
                Field::GeneralConsiderations => {
                    let current = self.values.general_considerations.take();
                    self.values.general_considerations = merge_considerations(
                        &[current.as_deref(), Some(new.as_str())],
                        Some(self.cap),
                    );
                }
                Field::CoverageFor => self.values.coverage_for = Some(new),
                Field::RouteOfAdministration => self.values.route_of_administration = Some(new),
                Field::RenalAdjustment => self.values.renal_adjustment = Some(new),
            }
        }
    }

    /// One-line digest of what has been extracted so far.
    pub fn summary(&self) -> String {
        let parts: Vec<String> = Field::ALL
            .iter()
            .filter_map(|f| {
                self.values
                    .get(*f)
                    .map(|v| format!("{}: {}", f.as_str(), truncate_chars(v, 120)))
            })
            .collect();
        if parts.is_empty() {
            "nothing yet".to_string()
        } else {
            parts.join("; ")
        }
    }

    pub fn found_any(&self) -> bool {
        Field::ALL.iter().any(|f| self.values.get(*f).is_some())
    }

    pub fn into_values(self) -> FieldValues {
        self.values
    }
}
