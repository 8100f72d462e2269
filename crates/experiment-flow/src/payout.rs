//! Per-trial payout rules.
//!
//! Participants stake part of a fixed budget on the outcome a stimulus
//! depicts. The unstaked remainder is kept minus a flat tax; winnings on
//! a favorable outcome are the stake divided by the odds, taxed in
//! fixed-width tiers. All amounts are dollars rounded to the nearest
//! cent.

use rand::Rng;

/// Flat tax on the unstaked remainder of the budget.
const KEEP_TAX: f64 = 0.25;

/// Lower bound of each winnings tax tier, in dollars.
const TAX_TIERS: [f64; 5] = [0.0, 0.5, 1.0, 1.5, 2.0];

/// Tax rate within each tier.
const TAX_RATES: [f64; 5] = [0.1, 0.2, 0.3, 0.4, 0.5];

/// Width of a tier; winnings beyond the last tier are not paid out.
const TIER_WIDTH: f64 = 0.5;

/// Round to the nearest cent.
pub fn round_cent(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// After-tax winnings for gross winnings in dollars.
pub fn tiered_tax(winnings: f64) -> f64 {
    let mut kept = 0.0;
    let mut i = 0;
    while i < TAX_TIERS.len() && winnings - TAX_TIERS[i] > 0.0 {
        kept += (winnings - TAX_TIERS[i]).min(TIER_WIDTH) * (1.0 - TAX_RATES[i]);
        i += 1;
    }
    round_cent(kept)
}

/// Biased coin flip: true when the favorable outcome occurs.
pub fn outcome(odds: f64, rng: &mut impl Rng) -> bool {
    rng.random::<f64>() <= odds
}

/// Result of settling one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    /// After-tax remainder of the budget the participant did not stake.
    pub kept: f64,
    /// After-tax winnings; zero on an unfavorable outcome.
    pub winnings: f64,
    /// Whether the favorable outcome occurred.
    pub won: bool,
}

impl Settlement {
    /// Total payment for the trial.
    pub fn pay(&self) -> f64 {
        round_cent(self.kept + self.winnings)
    }
}

/// Settle a bet at the given odds against a simulated outcome.
pub fn settle(budget: f64, bet: f64, odds: f64, rng: &mut impl Rng) -> Settlement {
    let kept = round_cent((budget - bet) * (1.0 - KEEP_TAX));
    let won = outcome(odds, rng);
    let winnings = if won { tiered_tax(bet / odds) } else { 0.0 };
    Settlement { kept, winnings, won }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn rounds_to_the_nearest_cent() {
        assert_eq!(round_cent(0.125), 0.13);
        assert_eq!(round_cent(0.124), 0.12);
        assert_eq!(round_cent(1.0), 1.0);
    }

    #[test]
    fn tiered_tax_within_the_first_tier() {
        // 0.40 entirely in the 10% tier.
        assert_eq!(tiered_tax(0.4), 0.36);
    }

    #[test]
    fn tiered_tax_spans_tiers() {
        // 1.00 = 0.50 at 10% + 0.50 at 20%.
        assert_eq!(tiered_tax(1.0), 0.85);
    }

    #[test]
    fn tiered_tax_caps_beyond_the_last_tier() {
        // Every tier saturated: 0.5 * (0.9 + 0.8 + 0.7 + 0.6 + 0.5).
        assert_eq!(tiered_tax(3.0), 1.75);
        assert_eq!(tiered_tax(100.0), 1.75);
    }

    #[test]
    fn tiered_tax_of_nothing_is_nothing() {
        assert_eq!(tiered_tax(0.0), 0.0);
    }

    #[test]
    fn losing_pays_only_the_kept_remainder() {
        // Odds of 0.0 can never win.
        let mut rng = StdRng::seed_from_u64(7);
        let s = settle(1.0, 0.4, 0.0, &mut rng);
        assert!(!s.won);
        assert_eq!(s.winnings, 0.0);
        assert_eq!(s.kept, 0.45);
        assert_eq!(s.pay(), 0.45);
    }

    #[test]
    fn certain_outcome_always_pays_winnings() {
        let mut rng = StdRng::seed_from_u64(7);
        let s = settle(1.0, 0.5, 1.0, &mut rng);
        assert!(s.won);
        // bet / odds = 0.5 gross, taxed at 10%.
        assert_eq!(s.winnings, 0.45);
        assert_eq!(s.kept, 0.38);
        assert_eq!(s.pay(), 0.83);
    }

    #[test]
    fn staking_the_whole_budget_keeps_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        let s = settle(1.0, 1.0, 0.0, &mut rng);
        assert_eq!(s.kept, 0.0);
        assert_eq!(s.pay(), 0.0);
    }

    #[test]
    fn settlement_is_deterministic_under_a_seed() {
        let a = settle(1.0, 0.3, 0.6, &mut StdRng::seed_from_u64(99));
        let b = settle(1.0, 0.3, 0.6, &mut StdRng::seed_from_u64(99));
        assert_eq!(a, b);
    }
}
