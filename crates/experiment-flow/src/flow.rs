//! Page flow for the experiment session.
//!
//! The session walks a fixed sequence: landing, instructions, practice,
//! main trials, strategy prompt, numeracy survey, final page. Every page
//! carries the worker id and condition forward as query parameters, and
//! trial pages chain until the last trial hands off to the strategy
//! prompt. Repeat participants are routed to the return-study page
//! instead of re-entering the flow.

use crate::response::TrialResponse;

/// A page in the session sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Landing,
    /// Shown to repeat participants: instructs them to return the task.
    ReturnStudy,
    Instructions,
    Practice,
    /// A 1-based main trial.
    Trial(usize),
    Strategy,
    Survey,
    Final,
}

impl Page {
    /// Route path of this page, matching the template names.
    pub fn path(&self) -> &'static str {
        match self {
            Page::Landing => "/",
            Page::ReturnStudy => "/0_return",
            Page::Instructions => "/1_instructions",
            Page::Practice => "/2_practice",
            Page::Trial(_) => "/3_main_experiment_interface",
            Page::Strategy => "/4a_strategy",
            Page::Survey => "/4b_survey",
            Page::Final => "/5_final",
        }
    }

    /// The page that follows this one in a session with `max_trials`
    /// main trials. Terminal and out-of-flow pages have no successor.
    pub fn next(&self, max_trials: usize) -> Option<Page> {
        match self {
            Page::Landing | Page::ReturnStudy | Page::Final => None,
            Page::Instructions => Some(Page::Practice),
            Page::Practice => Some(Page::Trial(1)),
            Page::Trial(t) if *t >= max_trials => Some(Page::Strategy),
            Page::Trial(t) => Some(Page::Trial(t + 1)),
            Page::Strategy => Some(Page::Survey),
            Page::Survey => Some(Page::Final),
        }
    }

    /// URL with the query parameters the flow threads through every
    /// page. Trial-bearing pages also carry the trial segment.
    pub fn url(&self, worker_id: &str, condition: &str) -> String {
        match self {
            Page::Landing => self.path().to_string(),
            Page::Practice => format!(
                "{}?workerId={}&cond={}&trial=practice",
                self.path(),
                worker_id,
                condition
            ),
            Page::Trial(t) => format!(
                "{}?workerId={}&cond={}&trial={}",
                self.path(),
                worker_id,
                condition,
                t
            ),
            _ => format!("{}?workerId={}&cond={}", self.path(), worker_id, condition),
        }
    }
}

/// What the trial route should do with a stored response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialDisposition {
    /// Render the trial.
    Present,
    /// The trial is already settled: redirect to its successor so a
    /// refresh cannot redo a paid trial.
    SkipForward,
}

/// Resume rule for a trial page. Testing mode always re-presents.
pub fn trial_disposition(testing: bool, stored: Option<&TrialResponse>) -> TrialDisposition {
    match stored {
        Some(resp) if !testing && resp.is_paid() => TrialDisposition::SkipForward,
        _ => TrialDisposition::Present,
    }
}
