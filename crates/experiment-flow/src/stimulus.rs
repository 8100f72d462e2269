//! Stimulus catalog for the betting task.
//!
//! Stimuli cross two standard-deviation levels with ten odds levels, in
//! catalog order: the ten sd-1 stimuli followed by the ten sd-5 stimuli.
//! The assigned trial order indexes into this catalog.

use serde::Serialize;

/// Odds of the favorable outcome for the ten base stimuli.
const ODDS_LEVELS: [f64; 10] = [
    0.025, 0.055, 0.116, 0.228, 0.400, 0.600, 0.772, 0.884, 0.945, 0.975,
];

/// Standard-deviation levels crossed with the odds list.
const SD_LEVELS: [u8; 2] = [1, 5];

/// One stimulus: a visualization of two outcome distributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stimulus {
    /// Standard deviation of the depicted distributions.
    pub sd: u8,
    /// Ground-truth odds of the favorable outcome.
    pub odds: f64,
}

impl Stimulus {
    /// Image path for this stimulus under the given visualization
    /// condition. Animated (HOPs) conditions ship as gifs, static
    /// conditions as svgs.
    pub fn asset_path(&self, condition: &str) -> String {
        format!(
            "img/{}-{}_sd_{}_odds.{}",
            condition,
            self.sd,
            self.odds,
            extension(condition)
        )
    }
}

fn extension(condition: &str) -> &'static str {
    if condition.contains("HOPs") { "gif" } else { "svg" }
}

/// The fixed set of stimuli, addressed by condition index.
#[derive(Debug, Clone)]
pub struct StimulusCatalog {
    stimuli: Vec<Stimulus>,
}

impl StimulusCatalog {
    /// The standard catalog: sd 1 x ten odds, then sd 5 x ten odds.
    pub fn standard() -> Self {
        let stimuli = SD_LEVELS
            .iter()
            .flat_map(|&sd| ODDS_LEVELS.iter().map(move |&odds| Stimulus { sd, odds }))
            .collect();
        Self { stimuli }
    }

    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }

    /// Stimulus for a condition index from the assigned trial order.
    pub fn get(&self, condition_index: usize) -> Option<Stimulus> {
        self.stimuli.get(condition_index).copied()
    }

    /// The fixed practice stimulus shown before the main trials.
    pub fn practice(&self) -> Stimulus {
        Stimulus { sd: 5, odds: 0.228 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalog_has_twenty_stimuli() {
        let catalog = StimulusCatalog::standard();
        assert_eq!(catalog.len(), 20);
    }

    #[test]
    fn catalog_orders_sd_one_before_sd_five() {
        let catalog = StimulusCatalog::standard();
        assert_eq!(catalog.get(0).unwrap(), Stimulus { sd: 1, odds: 0.025 });
        assert_eq!(catalog.get(9).unwrap(), Stimulus { sd: 1, odds: 0.975 });
        assert_eq!(catalog.get(10).unwrap(), Stimulus { sd: 5, odds: 0.025 });
        assert_eq!(catalog.get(19).unwrap(), Stimulus { sd: 5, odds: 0.975 });
        assert!(catalog.get(20).is_none());
    }

    #[test]
    fn animated_conditions_use_gif_assets() {
        let stim = Stimulus { sd: 5, odds: 0.228 };
        assert_eq!(stim.asset_path("HOPs"), "img/HOPs-5_sd_0.228_odds.gif");
        assert_eq!(stim.asset_path("intervals"), "img/intervals-5_sd_0.228_odds.svg");
    }

    #[test]
    fn asset_paths_drop_trailing_zeros_like_the_clients_did() {
        let stim = Stimulus { sd: 1, odds: 0.400 };
        assert_eq!(stim.asset_path("density"), "img/density-1_sd_0.4_odds.svg");
    }

    #[test]
    fn practice_stimulus_is_fixed() {
        let catalog = StimulusCatalog::standard();
        assert_eq!(catalog.practice(), Stimulus { sd: 5, odds: 0.228 });
    }
}
