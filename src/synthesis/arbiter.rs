//! Category arbitration across the members of a unified group

use crate::model::{Category, Tier};
use serde::{Deserialize, Serialize};

/// Weighted-vote policy for the final tier of a group.
///
/// A tier holding more than `consensus_threshold` of the valid votes wins
/// outright. Otherwise the highest `count * weight` wins, ties going to the
/// higher tier. `not_known` and `remove` votes are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArbiterPolicy {
    pub consensus_threshold: f64,
    pub first_choice_weight: u32,
    pub second_choice_weight: u32,
    pub alternative_weight: u32,
}

impl Default for ArbiterPolicy {
    fn default() -> Self {
        Self {
            consensus_threshold: 0.6,
            first_choice_weight: Category::FirstChoice.vote_weight().unwrap_or(4),
            second_choice_weight: Category::SecondChoice.vote_weight().unwrap_or(3),
            alternative_weight: Category::AlternativeAntibiotic.vote_weight().unwrap_or(2),
        }
    }
}

impl ArbiterPolicy {
    fn weight(&self, tier: Tier) -> u32 {
        match tier {
            Tier::FirstChoice => self.first_choice_weight,
            Tier::SecondChoice => self.second_choice_weight,
            Tier::AlternativeAntibiotic => self.alternative_weight,
        }
    }

    pub fn assign<I>(&self, votes: I) -> Tier
    where
        I: IntoIterator<Item = Category>,
    {
        let mut counts = [0u32; 3];
        for vote in votes {
            if let Some(tier) = Tier::from_category(vote) {
                counts[tier_slot(tier)] += 1;
            }
        }

        let total: u32 = counts.iter().sum();
        if total == 0 {
            return Tier::AlternativeAntibiotic;
        }

        for tier in Tier::ALL {
            let share = f64::from(counts[tier_slot(tier)]) / f64::from(total);
            if share > self.consensus_threshold {
                return tier;
            }
        }

        let mut best = Tier::AlternativeAntibiotic;
        let mut best_score = 0u32;
        for tier in Tier::ALL {
            let score = counts[tier_slot(tier)] * self.weight(tier);
            // Tier::ALL runs from the highest tier down, so `>` keeps ties high.
            if score > best_score {
                best = tier;
                best_score = score;
            }
        }
        best
    }
}

fn tier_slot(tier: Tier) -> usize {
    match tier {
        Tier::FirstChoice => 0,
        Tier::SecondChoice => 1,
        Tier::AlternativeAntibiotic => 2,
    }
}
