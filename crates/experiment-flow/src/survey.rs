//! Strategy and numeracy survey records.
//!
//! The strategy prompt collects one free-text response; the numeracy
//! survey collects eleven numeric items with per-item maxima. Both gate
//! progression: the route only advances once the stored record passes
//! the completeness check.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of numeracy items.
pub const NUMERACY_ITEMS: usize = 11;

/// Maximum allowed response for numeracy items 1..=11; minimum is 0.
const ITEM_MAXIMA: [f64; NUMERACY_ITEMS] = [
    1000.0, 1000.0, 100.0, 1000.0, 100.0, 100.0, 100.0, 100.0, 1000.0, 100.0, 10000.0,
];

/// The survey document stored at `survey/{workerId}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    pub worker_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Free-text answer from the strategy prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Numeracy answers keyed by item number ("1".."11"), as stored.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub numeracy: BTreeMap<String, f64>,
}

/// Completeness of a stored survey record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurveyStatus {
    Complete,
    /// No survey document exists for this participant.
    NoEntry,
    /// The strategy prompt has no response.
    MissingStrategy,
    /// The numeracy survey has no responses at all.
    NoResponses,
    /// A specific item has no response.
    MissingItem(usize),
    /// A specific item is out of range or not a number.
    InvalidItem(usize),
}

impl SurveyStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, SurveyStatus::Complete)
    }
}

impl fmt::Display for SurveyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurveyStatus::Complete => write!(f, "complete"),
            SurveyStatus::NoEntry => write!(f, "no survey entry"),
            SurveyStatus::MissingStrategy => write!(f, "no strategy response"),
            SurveyStatus::NoResponses => write!(f, "no numeracy responses"),
            SurveyStatus::MissingItem(i) => write!(f, "no response for question {i}"),
            SurveyStatus::InvalidItem(i) => write!(f, "invalid response for question {i}"),
        }
    }
}

/// Maximum allowed response for a 1-based item number.
pub fn item_maximum(item: usize) -> Option<f64> {
    (1..=NUMERACY_ITEMS)
        .contains(&item)
        .then(|| ITEM_MAXIMA[item - 1])
}

/// Check the strategy prompt response.
pub fn strategy_status(record: Option<&SurveyRecord>) -> SurveyStatus {
    match record {
        None => SurveyStatus::NoEntry,
        Some(rec) => match &rec.strategy {
            Some(s) if !s.trim().is_empty() => SurveyStatus::Complete,
            _ => SurveyStatus::MissingStrategy,
        },
    }
}

/// Check all numeracy items, reporting the first gap in item order.
pub fn numeracy_status(record: Option<&SurveyRecord>) -> SurveyStatus {
    let Some(rec) = record else {
        return SurveyStatus::NoEntry;
    };
    if rec.numeracy.is_empty() {
        return SurveyStatus::NoResponses;
    }
    for item in 1..=NUMERACY_ITEMS {
        let Some(&value) = rec.numeracy.get(&item.to_string()) else {
            return SurveyStatus::MissingItem(item);
        };
        let max = ITEM_MAXIMA[item - 1];
        if !value.is_finite() || value < 0.0 || value > max {
            return SurveyStatus::InvalidItem(item);
        }
    }
    SurveyStatus::Complete
}
