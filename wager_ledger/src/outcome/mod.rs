//! Game outcome generators.
//!
//! The ledger asks an [`OutcomeGenerator`] for the payout of each wager. Real
//! deployments plug in the certified game engine; [`PayoutTable`] is a
//! weighted-random stand-in and [`FixedOutcome`] is deterministic.

use crate::ledger::Amount;
use rand::Rng;

/// Decides how much a wager pays out
pub trait OutcomeGenerator: Send + Sync {
    /// Win amount for `wager`, never negative
    fn win_amount(&self, wager: Amount) -> Amount;
}

/// Always pays the same amount
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedOutcome(pub Amount);

impl OutcomeGenerator for FixedOutcome {
    fn win_amount(&self, _wager: Amount) -> Amount {
        self.0.max(0)
    }
}

/// Pays `multiplier × wager`
#[derive(Debug, Clone, Copy)]
pub struct MultiplierOutcome(pub i64);

impl OutcomeGenerator for MultiplierOutcome {
    fn win_amount(&self, wager: Amount) -> Amount {
        wager.saturating_mul(self.0).max(0)
    }
}

/// One payout band: hit with `probability`, pay a uniform multiplier in range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoutTier {
    pub name: &'static str,
    pub probability: f64,
    pub min_multiplier: i64,
    pub max_multiplier: i64,
}

/// Weighted random payouts, tiers checked from rarest to most common
#[derive(Debug, Clone)]
pub struct PayoutTable {
    tiers: Vec<PayoutTier>,
}

impl PayoutTable {
    /// Build a table from tiers whose probabilities sum to at most 1
    pub fn new(tiers: Vec<PayoutTier>) -> Self {
        Self { tiers }
    }

    /// Slot-style defaults: jackpot 0.1%, large 0.5%, medium 3.5%, small 15%
    pub fn slots() -> Self {
        Self::new(vec![
            PayoutTier {
                name: "jackpot",
                probability: 0.001,
                min_multiplier: 100,
                max_multiplier: 250,
            },
            PayoutTier {
                name: "large",
                probability: 0.004,
                min_multiplier: 20,
                max_multiplier: 50,
            },
            PayoutTier {
                name: "medium",
                probability: 0.030,
                min_multiplier: 5,
                max_multiplier: 15,
            },
            PayoutTier {
                name: "small",
                probability: 0.115,
                min_multiplier: 1,
                max_multiplier: 3,
            },
        ])
    }

    pub fn tiers(&self) -> &[PayoutTier] {
        &self.tiers
    }

    /// Probability that a wager pays anything
    pub fn hit_probability(&self) -> f64 {
        self.tiers.iter().map(|tier| tier.probability).sum()
    }

    /// Theoretical return to player as a ratio (mean multiplier × probability)
    pub fn expected_rtp(&self) -> f64 {
        self.tiers
            .iter()
            .map(|tier| tier.probability * (tier.min_multiplier + tier.max_multiplier) as f64 / 2.0)
            .sum()
    }

    /// Resolve `wager` against the table using `rng`
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R, wager: Amount) -> Amount {
        let roll: f64 = rng.random();
        let mut threshold = 0.0;
        for tier in &self.tiers {
            threshold += tier.probability;
            if roll < threshold {
                let multiplier = rng.random_range(tier.min_multiplier..=tier.max_multiplier);
                return wager.saturating_mul(multiplier);
            }
        }
        0
    }
}

impl Default for PayoutTable {
    fn default() -> Self {
        Self::slots()
    }
}

impl OutcomeGenerator for PayoutTable {
    fn win_amount(&self, wager: Amount) -> Amount {
        self.draw(&mut rand::rng(), wager)
    }
}
