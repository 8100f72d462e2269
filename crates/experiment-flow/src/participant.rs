//! Participant records and completion tokens.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::RunLabel;

const TOKEN_CHARSET: &[u8] = b"0123456789ABCDEF";
const TOKEN_LEN: usize = 16;

/// The worker document created at registration, stored at
/// `workers/{workerId}`. Field names match the stored JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub worker_id: String,
    pub assignment_id: String,
    /// Completion code the participant submits back to the recruitment
    /// platform after the final page.
    pub token: String,
    /// Visualization condition assigned to this participant.
    pub condition: String,
    /// Row of the balanced square used for this deployment.
    pub trial_set: usize,
    pub run: RunLabel,
    /// Total bonus in dollars; -1.0 until the final page settles it.
    pub bonus: f64,
    pub registered_at: DateTime<Utc>,
}

impl ParticipantRecord {
    pub fn new(
        worker_id: impl Into<String>,
        assignment_id: impl Into<String>,
        condition: impl Into<String>,
        trial_set: usize,
        run: RunLabel,
        rng: &mut impl Rng,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            assignment_id: assignment_id.into(),
            token: completion_token(rng),
            condition: condition.into(),
            trial_set,
            run,
            bonus: -1.0,
            registered_at: Utc::now(),
        }
    }

    /// Whether the final page has recorded this participant's bonus.
    pub fn bonus_settled(&self) -> bool {
        self.bonus >= 0.0
    }
}

/// A 16-character uppercase-hex completion code.
pub fn completion_token(rng: &mut impl Rng) -> String {
    (0..TOKEN_LEN)
        .map(|_| TOKEN_CHARSET[rng.random_range(0..TOKEN_CHARSET.len())] as char)
        .collect()
}
