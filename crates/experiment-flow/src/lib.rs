//! Server-side session logic for a counterbalanced repeated-measures
//! betting experiment.
//!
//! Participants arrive with a worker id and an assigned visualization
//! condition, walk a fixed page sequence (instructions, practice, main
//! trials, strategy prompt, numeracy survey, final page), and bet part of
//! a per-trial budget on the outcome each stimulus depicts. This crate
//! owns everything between the HTTP layer and the document store: the
//! assigned trial order, page progression, payout rules, survey
//! validation, and the persistence seam. The web framework, templates,
//! and database transport are external collaborators.

pub mod config;
pub mod flow;
pub mod participant;
pub mod payout;
pub mod response;
pub mod service;
pub mod stimulus;
pub mod store;
pub mod survey;
