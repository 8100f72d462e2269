//! Trial-order counterbalancing via balanced Latin squares.
//!
//! A repeated-measures experiment presents every participant the same set
//! of conditions, but the order of presentation must vary across
//! participant groups or practice and carryover effects contaminate the
//! measurements. This crate builds the balanced square once from static
//! configuration and hands the selected row to the session layer as an
//! immutable value.

mod assigner;
mod error;
mod square;

pub use assigner::{TrialOrder, trial_order};
pub use error::CounterbalanceError;
pub use square::BalancedLatinSquare;
