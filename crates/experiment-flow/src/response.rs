//! Trial response documents.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::stimulus::Stimulus;

/// Addresses one trial's response under a participant:
/// `responses/{workerId}/{trial}`. The practice trial keeps its own slot
/// next to the numbered ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TrialKey {
    Practice,
    Number(usize),
}

impl TrialKey {
    pub fn is_practice(&self) -> bool {
        matches!(self, TrialKey::Practice)
    }
}

impl fmt::Display for TrialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialKey::Practice => write!(f, "practice"),
            TrialKey::Number(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for TrialKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "practice" {
            return Ok(TrialKey::Practice);
        }
        s.parse()
            .map(TrialKey::Number)
            .map_err(|_| format!("invalid trial key: {s:?}"))
    }
}

// Stored either as the literal "practice" or as a bare number, matching
// the documents the original clients wrote.
impl Serialize for TrialKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TrialKey::Practice => serializer.serialize_str("practice"),
            TrialKey::Number(n) => serializer.serialize_u64(*n as u64),
        }
    }
}

impl<'de> Deserialize<'de> for TrialKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(usize),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(TrialKey::Number(n)),
            Raw::Text(s) => s.parse().map_err(D::Error::custom),
        }
    }
}

/// One trial's response, stored at `responses/{workerId}/{trial}`.
///
/// Estimates start at the -1.0 sentinel the clients expect; `pay` flips
/// from -1.0 exactly once, when feedback settles the trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResponse {
    pub worker_id: String,
    pub condition: String,
    pub trial: TrialKey,
    /// Condition index from the assigned trial order; absent for the
    /// practice trial.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trial_idx: Option<usize>,
    /// Ground-truth odds of the depicted outcome.
    pub ground_truth: f64,
    /// Standard deviation of the depicted distributions.
    pub sd_diff: f64,
    /// Probability-of-superiority estimate, 0..=100.
    pub cles: f64,
    /// Amount staked, in dollars.
    pub bet: f64,
    /// Settled payment in dollars, or -1.0 while feedback is pending.
    pub pay: f64,
}

impl TrialResponse {
    pub fn new(
        worker_id: impl Into<String>,
        condition: impl Into<String>,
        trial: TrialKey,
        trial_idx: Option<usize>,
        stimulus: &Stimulus,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            condition: condition.into(),
            trial,
            trial_idx,
            ground_truth: stimulus.odds,
            sd_diff: f64::from(stimulus.sd),
            cles: -1.0,
            bet: -1.0,
            pay: -1.0,
        }
    }

    /// Whether feedback has settled this trial. Paid responses are
    /// immutable outside testing mode.
    pub fn is_paid(&self) -> bool {
        self.pay >= 0.0
    }
}
