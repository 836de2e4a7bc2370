//! Unified entries and the therapy plan

use super::candidate::{Category, ResistanceGeneObservation, TherapyCandidate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// 1-based source index, as carried in `mentioned_in_sources`.
pub type SourceRef = usize;

/// Final tier of a unified entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    FirstChoice,
    SecondChoice,
    AlternativeAntibiotic,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::FirstChoice, Tier::SecondChoice, Tier::AlternativeAntibiotic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::FirstChoice => "first_choice",
            Tier::SecondChoice => "second_choice",
            Tier::AlternativeAntibiotic => "alternative_antibiotic",
        }
    }

    /// Tier for a voting category; `None` for `not_known` and `remove`.
    pub fn from_category(category: Category) -> Option<Self> {
        match category {
            Category::FirstChoice => Some(Tier::FirstChoice),
            Category::SecondChoice => Some(Tier::SecondChoice),
            Category::AlternativeAntibiotic => Some(Tier::AlternativeAntibiotic),
            Category::NotKnown | Category::Remove => None,
        }
    }

    pub fn as_category(&self) -> Category {
        match self {
            Tier::FirstChoice => Category::FirstChoice,
            Tier::SecondChoice => Category::SecondChoice,
            Tier::AlternativeAntibiotic => Category::AlternativeAntibiotic,
        }
    }

    /// Mandatory tiers must be actionable or absent.
    pub fn is_mandatory(&self) -> bool {
        matches!(self, Tier::FirstChoice | Tier::SecondChoice)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five content fields tracked for completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    CoverageFor,
    RouteOfAdministration,
    DoseDuration,
    RenalAdjustment,
    GeneralConsiderations,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::CoverageFor,
        Field::RouteOfAdministration,
        Field::DoseDuration,
        Field::RenalAdjustment,
        Field::GeneralConsiderations,
    ];

    /// Fields that are never defaulted; an entry without them is dropped.
    pub const MANDATORY: [Field; 3] = [
        Field::DoseDuration,
        Field::CoverageFor,
        Field::RouteOfAdministration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::CoverageFor => "coverage_for",
            Field::RouteOfAdministration => "route_of_administration",
            Field::DoseDuration => "dose_duration",
            Field::RenalAdjustment => "renal_adjustment",
            Field::GeneralConsiderations => "general_considerations",
        }
    }
}

/// One drug after cross-source merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedEntry {
    pub medical_name: String,
    pub coverage_for: Option<String>,
    pub route_of_administration: Option<String>,
    pub dose_duration: Option<String>,
    pub renal_adjustment: Option<String>,
    pub general_considerations: Option<String>,
    pub is_combined: bool,
    pub mentioned_in_sources: BTreeSet<SourceRef>,
    #[serde(default)]
    pub is_complete: bool,
    pub final_category: Tier,
}

impl UnifiedEntry {
    /// Lifts a singleton candidate, stripping its per-source provenance.
    pub fn from_candidate(candidate: &TherapyCandidate, tier: Tier) -> Self {
        let mut entry = Self {
            medical_name: candidate.medical_name.clone(),
            coverage_for: candidate.coverage_for.clone(),
            route_of_administration: candidate.route_of_administration.clone(),
            dose_duration: candidate.dose_duration.clone(),
            renal_adjustment: candidate.renal_adjustment.clone(),
            general_considerations: candidate.general_considerations.clone(),
            is_combined: candidate.is_combined,
            mentioned_in_sources: BTreeSet::from([candidate.source_index]),
            is_complete: false,
            final_category: tier,
        };
        entry.refresh_completeness();
        entry
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

    pub fn set(&mut self, field: Field, value: Option<String>) {
        let slot = match field {
            Field::CoverageFor => &mut self.coverage_for,
            Field::RouteOfAdministration => &mut self.route_of_administration,
            Field::DoseDuration => &mut self.dose_duration,
            Field::RenalAdjustment => &mut self.renal_adjustment,
            Field::GeneralConsiderations => &mut self.general_considerations,
        };
        *slot = value;
    }

    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    pub fn has_mandatory_fields(&self) -> bool {
        Field::MANDATORY.iter().all(|f| self.get(*f).is_some())
    }

    /// Recomputes `is_complete` from the five content fields.
    pub fn refresh_completeness(&mut self) {
        self.is_complete = Field::ALL.iter().all(|f| self.get(*f).is_some());
    }
}

/// A source that contributed to the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub index: SourceRef,
    pub url: String,
    pub title: String,
}

/// The externally visible artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TherapyPlan {
    pub first_choice: Vec<UnifiedEntry>,
    pub second_choice: Vec<UnifiedEntry>,
    pub alternative_antibiotic: Vec<UnifiedEntry>,
    pub resistance_genes: Vec<ResistanceGeneObservation>,
    #[serde(default)]
    pub sources: Vec<SourceSummary>,
}

impl TherapyPlan {
    pub fn tier(&self, tier: Tier) -> &Vec<UnifiedEntry> {
        match tier {
            Tier::FirstChoice => &self.first_choice,
            Tier::SecondChoice => &self.second_choice,
            Tier::AlternativeAntibiotic => &self.alternative_antibiotic,
        }
    }

    pub fn tier_mut(&mut self, tier: Tier) -> &mut Vec<UnifiedEntry> {
        match tier {
            Tier::FirstChoice => &mut self.first_choice,
            Tier::SecondChoice => &mut self.second_choice,
            Tier::AlternativeAntibiotic => &mut self.alternative_antibiotic,
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &UnifiedEntry> {
        self.first_choice
            .iter()
            .chain(self.second_choice.iter())
            .chain(self.alternative_antibiotic.iter())
    }

    pub fn len(&self) -> usize {
        self.first_choice.len() + self.second_choice.len() + self.alternative_antibiotic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry lacking dose, coverage or route and refreshes
    /// completeness on the survivors. Returns the names that were removed.
    pub fn enforce_integrity(&mut self) -> Vec<String> {
        let mut removed = Vec::new();
        for tier in Tier::ALL {
            self.tier_mut(tier).retain_mut(|entry| {
                entry.refresh_completeness();
                if entry.has_mandatory_fields() {
                    true
                } else {
                    removed.push(entry.medical_name.clone());
                    false
                }
            });
        }
        removed
    }
}
