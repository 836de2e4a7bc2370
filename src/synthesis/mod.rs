//! Identity resolution, unification and category arbitration
//!
//! Candidates from every source are grouped by normalised name, each group is
//! merged into one [`UnifiedEntry`], and the group's member categories vote on
//! the entry's final tier.

mod arbiter;
mod genes;
mod grouping;
mod merge;
mod unifier;

pub use arbiter::ArbiterPolicy;
pub use genes::{merge_gene_observations, unify_genes};
pub use grouping::{group_by_name, Group};
pub use merge::{
    dose_completeness, merge_considerations, merge_field_values, merge_routes, pick_dose,
    pick_renal, FieldValues, NO_RENAL_ADJUSTMENT,
};
pub(crate) use merge::truncate_chars;
pub use unifier::Unifier;

use crate::model::{
    Category, ResistanceGeneObservation, TherapyCandidate, TherapyPlan, Tier, UnifiedEntry,
};
use std::collections::BTreeSet;
use tracing::{debug, info};

pub const DEFAULT_FIRST_CHOICE_LIMIT: usize = 5;
pub const DEFAULT_SECOND_CHOICE_LIMIT: usize = 4;

#[derive(Clone)]
pub struct Synthesizer {
    unifier: Unifier,
    arbiter: ArbiterPolicy,
    first_choice_limit: usize,
    second_choice_limit: usize,
}

impl Synthesizer {
    pub fn new(unifier: Unifier) -> Self {
        Self {
            unifier,
            arbiter: ArbiterPolicy::default(),
            first_choice_limit: DEFAULT_FIRST_CHOICE_LIMIT,
            second_choice_limit: DEFAULT_SECOND_CHOICE_LIMIT,
        }
    }

    pub fn with_arbiter(mut self, arbiter: ArbiterPolicy) -> Self {
        self.arbiter = arbiter;
        self
    }

    pub fn with_limits(mut self, first_choice: usize, second_choice: usize) -> Self {
        self.first_choice_limit = first_choice;
        self.second_choice_limit = second_choice;
        self
    }

    pub fn unifier(&self) -> &Unifier {
        &self.unifier
    }

    /// One entry per normalised name, in order of first appearance.
    pub async fn unify_candidates(&self, candidates: Vec<TherapyCandidate>) -> Vec<UnifiedEntry> {
        let kept = candidates.into_iter().filter(|c| {
            let keep = c.category != Category::Remove;
            if !keep {
                debug!(drug = %c.medical_name, "Skipping candidate marked for removal");
            }
            keep
        });
        let groups = group_by_name(kept, |c| c.medical_name.as_str());

        let mut entries = Vec::with_capacity(groups.len());
        for group in groups {
            let tier = self.arbiter.assign(group.members.iter().map(|c| c.category));

            if group.is_singleton() {
                entries.push(UnifiedEntry::from_candidate(&group.members[0], tier));
                continue;
            }

            let first = &group.members[0];
            let values: Vec<FieldValues> =
                group.members.iter().map(FieldValues::from_candidate).collect();
            let merged = self.unifier.unify_fields(&first.medical_name, &values).await;

            let mut entry = UnifiedEntry::from_candidate(first, tier);
            entry.is_combined = group.members.iter().any(|c| c.is_combined);
            entry.mentioned_in_sources =
                group.members.iter().map(|c| c.source_index).collect();
            merged.apply_to(&mut entry);

            debug!(
                drug = %entry.medical_name,
                members = group.members.len(),
                tier = %tier,
                "Unified candidate group"
            );
            entries.push(entry);
        }

        entries
    }

    /// Builds the tiered plan: unify, arbitrate, order by support and cap the mandatory tiers.
    pub async fn build_plan(
        &self,
        candidates: Vec<TherapyCandidate>,
        genes: Vec<ResistanceGeneObservation>,
    ) -> TherapyPlan {
        let candidate_count = candidates.len();
        let mut plan = TherapyPlan::default();
        for entry in self.unify_candidates(candidates).await {
            plan.tier_mut(entry.final_category).push(entry);
        }

        for tier in Tier::ALL {
            let entries = plan.tier_mut(tier);
            entries.sort_by(|a, b| b.mentioned_in_sources.len().cmp(&a.mentioned_in_sources.len()));
            let limit = match tier {
                Tier::FirstChoice => Some(self.first_choice_limit),
                Tier::SecondChoice => Some(self.second_choice_limit),
                Tier::AlternativeAntibiotic => None,
            };
            if let Some(limit) = limit {
                entries.truncate(limit);
            }
        }

        plan.resistance_genes = unify_genes(&self.unifier, genes).await;

        info!(
            candidates = candidate_count,
            first_choice = plan.first_choice.len(),
            second_choice = plan.second_choice.len(),
            alternative = plan.alternative_antibiotic.len(),
            genes = plan.resistance_genes.len(),
            "Synthesized therapy plan"
        );
        plan
    }

    /// Merges entries that now share a normalised name, across tiers.
    ///
    /// A merged entry takes the highest tier among its members. Running this
    /// on a plan without duplicates leaves it unchanged.
    pub async fn regroup(&self, plan: &mut TherapyPlan) {
        let entries: Vec<UnifiedEntry> = Tier::ALL
            .iter()
            .flat_map(|tier| std::mem::take(plan.tier_mut(*tier)))
            .collect();
        let groups = group_by_name(entries, |e| e.medical_name.as_str());

        for group in groups {
            let mut members = group.members.into_iter();
            let Some(mut entry) = members.next() else {
                continue;
            };
            let rest: Vec<UnifiedEntry> = members.collect();

            if !rest.is_empty() {
                let mut all = Vec::with_capacity(rest.len() + 1);
                all.push(FieldValues::from_entry(&entry));
                all.extend(rest.iter().map(FieldValues::from_entry));
                let merged = self.unifier.unify_fields(&entry.medical_name, &all).await;

                let sources: BTreeSet<usize> = rest
                    .iter()
                    .flat_map(|e| e.mentioned_in_sources.iter().copied())
                    .collect();
                entry.mentioned_in_sources.extend(sources);
                entry.is_combined |= rest.iter().any(|e| e.is_combined);
                entry.final_category = rest
                    .iter()
                    .map(|e| e.final_category)
                    .fold(entry.final_category, Ord::min);
                merged.apply_to(&mut entry);

                debug!(drug = %entry.medical_name, merged = rest.len() + 1, "Merged duplicate entries");
            }

            plan.tier_mut(entry.final_category).push(entry);
        }
    }
}
