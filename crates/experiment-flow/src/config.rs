//! Deployment configuration.
//!
//! One TOML file per deployment names the trial count, which row of the
//! balanced square this run uses, and where participant state lives.
//! Validation happens at load time so a bad counterbalancing index fails
//! the process at startup instead of mid-session.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use counterbalance::{BalancedLatinSquare, TrialOrder};

/// Top-level experiment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Number of main-phase trials per participant.
    pub max_trials: usize,

    /// Which row of the balanced square this deployment assigns.
    pub trial_set_index: usize,

    /// Deployment label recorded on every participant document.
    pub run: RunLabel,

    /// Testing mode: repeat registration overwrites the participant
    /// record and settled trials stay editable.
    pub testing: bool,

    /// Stake available on each trial, in dollars.
    pub budget: f64,

    /// Remote document store settings.
    pub database: DatabaseConfig,
}

/// Whether a deployment collects pilot or main-experiment data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunLabel {
    Pilot,
    Experiment,
}

impl RunLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunLabel::Pilot => "pilot",
            RunLabel::Experiment => "experiment",
        }
    }
}

/// Connection settings for the realtime document database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Base URL, e.g. "https://<project>.firebaseio.com".
    pub url: String,

    /// Database secret sent as the `auth` query parameter.
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            max_trials: 20,
            trial_set_index: 0,
            run: RunLabel::Pilot,
            testing: false,
            budget: 1.0,
            database: DatabaseConfig {
                url: "http://localhost:9000".to_string(),
                auth_token: None,
            },
        }
    }
}

impl ExperimentConfig {
    /// Load and validate a configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration against the square it implies.
    ///
    /// The row bound accounts for the doubled row count of odd trial
    /// counts, so a `trial_set_index` of `n` is valid when `max_trials`
    /// is odd and invalid when it is even.
    pub fn validate(&self) -> Result<()> {
        if self.max_trials < 1 {
            bail!("max_trials must be at least 1");
        }
        if self.budget <= 0.0 {
            bail!("budget must be positive (got {})", self.budget);
        }
        let square = BalancedLatinSquare::generate(self.max_trials)?;
        if self.trial_set_index >= square.row_count() {
            bail!(
                "trial_set_index {} out of range: the {}-trial square has {} rows",
                self.trial_set_index,
                self.max_trials,
                square.row_count()
            );
        }
        Ok(())
    }

    /// The immutable trial order this deployment assigns to every
    /// participant.
    pub fn assigned_order(&self) -> Result<TrialOrder> {
        self.validate()?;
        Ok(counterbalance::trial_order(
            self.max_trials,
            self.trial_set_index,
        )?)
    }
}
