//! Selected trial orders and the startup assignment helper.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CounterbalanceError;
use crate::square::BalancedLatinSquare;

/// One row of a balanced square: the condition indices to present, in
/// trial order. Immutable once selected; the session layer indexes into
/// it with 1-based trial numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrialOrder(Vec<usize>);

impl TrialOrder {
    pub(crate) fn new(cells: Vec<usize>) -> Self {
        Self(cells)
    }

    pub(crate) fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// Number of trials in the order.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True only for the degenerate empty order, which
    /// [`BalancedLatinSquare::generate`] never produces.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The condition indices as a slice.
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Condition index for a 1-based trial number.
    pub fn condition_for_trial(&self, trial_number: usize) -> Result<usize, CounterbalanceError> {
        if trial_number < 1 || trial_number > self.0.len() {
            return Err(CounterbalanceError::TrialOutOfRange {
                trial: trial_number,
                len: self.0.len(),
            });
        }
        Ok(self.0[trial_number - 1])
    }
}

impl fmt::Display for TrialOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Build the balanced square for `n` conditions and return an owned copy
/// of the row at `run_index`.
///
/// This is the one-call initialization used at process startup: the
/// deployment's configuration names `n` and the run index, and the
/// resulting order is held read-only for the lifetime of the service.
pub fn trial_order(n: usize, run_index: usize) -> Result<TrialOrder, CounterbalanceError> {
    let square = BalancedLatinSquare::generate(n)?;
    Ok(square.row(run_index)?.clone())
}
