//! Error types for square construction and row selection.

use thiserror::Error;

/// Failure modes of counterbalancing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterbalanceError {
    /// A square needs at least one condition.
    #[error("square size must be at least 1 (got {0})")]
    SizeTooSmall(usize),

    /// Run index outside the generated square's rows.
    #[error("run index {index} out of range for a square with {rows} rows")]
    RunIndexOutOfRange {
        /// The requested row.
        index: usize,
        /// Total rows in the square (doubled when the order is odd).
        rows: usize,
    },

    /// Trial number outside the selected row. Trials are 1-based.
    #[error("trial number {trial} out of range (valid: 1..={len})")]
    TrialOutOfRange {
        /// The requested trial number.
        trial: usize,
        /// Length of the selected row.
        len: usize,
    },
}
