//! Session service: the operations the page routes delegate to.
//!
//! One service instance is built at startup from a validated
//! configuration; the assigned trial order is computed once and held
//! read-only for the lifetime of the process. Every method is a pure
//! request/response step against the store, so the instance can be
//! shared across concurrent handlers without locking.

use anyhow::{Context, Result, bail};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use counterbalance::TrialOrder;

use crate::config::ExperimentConfig;
use crate::flow::{Page, TrialDisposition, trial_disposition};
use crate::participant::ParticipantRecord;
use crate::payout::{Settlement, round_cent, settle};
use crate::response::{TrialKey, TrialResponse};
use crate::stimulus::{Stimulus, StimulusCatalog};
use crate::store::{ExperimentStore, WriteOutcome};
use crate::survey::{self, SurveyStatus};

/// Outcome of a registration attempt.
#[derive(Debug, Clone)]
pub enum Registration {
    /// New participant: the record was created, proceed to practice.
    Accepted {
        record: ParticipantRecord,
        next_url: String,
    },
    /// The worker already has a record: route to the return-study page.
    Repeat { redirect_url: String },
}

/// Context for rendering the practice page.
#[derive(Debug, Clone, Serialize)]
pub struct PracticeContext {
    pub stimulus: Stimulus,
    pub stimulus_path: String,
    pub next_url: String,
}

/// What the trial route should render.
#[derive(Debug, Clone)]
pub enum TrialPage {
    Present(TrialContext),
    /// The trial is already settled: send the participant forward.
    Redirect { next_url: String },
}

/// Context for rendering one main trial.
#[derive(Debug, Clone, Serialize)]
pub struct TrialContext {
    /// 1-based trial number.
    pub trial: usize,
    /// Condition index from the assigned order.
    pub condition_index: usize,
    pub stimulus: Stimulus,
    pub stimulus_path: String,
    pub next_url: String,
}

/// A settled trial: the stored response plus the payout breakdown.
#[derive(Debug, Clone)]
pub struct SettledTrial {
    pub response: TrialResponse,
    pub settlement: Settlement,
    pub stored: WriteOutcome,
}

/// What the final page shows.
#[derive(Debug, Clone, Serialize)]
pub struct FinalSummary {
    /// Completion code to submit back to the recruitment platform.
    pub token: String,
    /// Total bonus across settled non-practice trials, in dollars.
    pub total_bonus: f64,
}

/// The session service shared by all request handlers.
pub struct ExperimentService<S> {
    config: ExperimentConfig,
    order: TrialOrder,
    catalog: StimulusCatalog,
    store: S,
}

impl<S: ExperimentStore> ExperimentService<S> {
    /// Build the service, computing the assigned order once.
    pub fn new(config: ExperimentConfig, store: S) -> Result<Self> {
        let order = config.assigned_order()?;
        let catalog = StimulusCatalog::standard();
        if order.len() > catalog.len() {
            bail!(
                "{} trials configured but the catalog has only {} stimuli",
                order.len(),
                catalog.len()
            );
        }
        info!(
            max_trials = config.max_trials,
            trial_set = config.trial_set_index,
            run = config.run.as_str(),
            order = %order,
            "assigned trial order"
        );
        Ok(Self {
            config,
            order,
            catalog,
            store,
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// The immutable order this deployment assigns to every participant.
    pub fn assigned_order(&self) -> &TrialOrder {
        &self.order
    }

    /// Register a participant arriving at the instructions page.
    ///
    /// Creation is conditional on the worker document being absent, so
    /// two concurrent arrivals with the same id cannot both register.
    /// Testing mode overwrites instead, issuing a fresh token.
    pub async fn register(
        &self,
        worker_id: &str,
        assignment_id: &str,
        condition: &str,
        rng: &mut impl Rng,
    ) -> Result<Registration> {
        let record = ParticipantRecord::new(
            worker_id,
            assignment_id,
            condition,
            self.config.trial_set_index,
            self.config.run,
            rng,
        );
        let next_url = Page::Practice.url(worker_id, condition);

        if self.config.testing {
            self.store.put_participant(&record).await?;
            debug!(worker = worker_id, "testing mode: replaced participant record");
            return Ok(Registration::Accepted { record, next_url });
        }

        match self.store.create_participant(&record).await? {
            WriteOutcome::Written => {
                info!(worker = worker_id, condition, "registered participant");
                Ok(Registration::Accepted { record, next_url })
            }
            WriteOutcome::Rejected => {
                info!(worker = worker_id, "repeat participation");
                Ok(Registration::Repeat {
                    redirect_url: Page::ReturnStudy.url(worker_id, condition),
                })
            }
        }
    }

    /// Context for the practice page.
    pub fn practice_page(&self, worker_id: &str, condition: &str) -> PracticeContext {
        let stimulus = self.catalog.practice();
        PracticeContext {
            stimulus,
            stimulus_path: stimulus.asset_path(condition),
            next_url: Page::Trial(1).url(worker_id, condition),
        }
    }

    /// Context for a main trial, or a redirect when the trial is
    /// already settled and the participant refreshed.
    pub async fn trial_page(
        &self,
        worker_id: &str,
        condition: &str,
        trial: usize,
    ) -> Result<TrialPage> {
        let condition_index = self.order.condition_for_trial(trial)?;
        let stimulus = self
            .catalog
            .get(condition_index)
            .with_context(|| format!("no stimulus for condition index {condition_index}"))?;
        let next_page = self
            .next_after_trial(trial)
            .expect("trial pages always have a successor");
        let next_url = next_page.url(worker_id, condition);

        // Testing mode always re-presents, so skip the store round trip.
        if !self.config.testing {
            let stored = self
                .store
                .fetch_response(worker_id, &TrialKey::Number(trial))
                .await?;
            if trial_disposition(false, stored.as_ref()) == TrialDisposition::SkipForward {
                debug!(worker = worker_id, trial, "trial already settled, skipping forward");
                return Ok(TrialPage::Redirect { next_url });
            }
        }

        Ok(TrialPage::Present(TrialContext {
            trial,
            condition_index,
            stimulus,
            stimulus_path: stimulus.asset_path(condition),
            next_url,
        }))
    }

    fn next_after_trial(&self, trial: usize) -> Option<Page> {
        Page::Trial(trial).next(self.config.max_trials)
    }

    /// Store an in-progress response (estimates entered, feedback not
    /// yet requested). The pay gate still applies: a settled trial's
    /// response cannot be replaced outside testing mode.
    pub async fn record_response(&self, response: &TrialResponse) -> Result<WriteOutcome> {
        let outcome = self
            .store
            .put_response_if_unpaid(
                &response.worker_id,
                &response.trial,
                response,
                self.config.testing,
            )
            .await?;
        if !outcome.written() {
            debug!(
                worker = %response.worker_id,
                trial = %response.trial,
                "response write rejected by the pay gate"
            );
        }
        Ok(outcome)
    }

    /// Settle a main trial at feedback time: simulate the outcome, apply
    /// the payout rules, and store the paid response.
    pub async fn settle_trial(
        &self,
        worker_id: &str,
        condition: &str,
        trial: usize,
        cles: f64,
        bet: f64,
        rng: &mut impl Rng,
    ) -> Result<SettledTrial> {
        if bet < 0.0 || bet > self.config.budget {
            bail!(
                "bet {} outside the valid range 0..={}",
                bet,
                self.config.budget
            );
        }
        let condition_index = self.order.condition_for_trial(trial)?;
        let stimulus = self
            .catalog
            .get(condition_index)
            .with_context(|| format!("no stimulus for condition index {condition_index}"))?;

        let settlement = settle(self.config.budget, bet, stimulus.odds, rng);
        let mut response = TrialResponse::new(
            worker_id,
            condition,
            TrialKey::Number(trial),
            Some(condition_index),
            &stimulus,
        );
        response.cles = cles;
        response.bet = bet;
        response.pay = settlement.pay();

        let stored = self.record_response(&response).await?;
        debug!(
            worker = worker_id,
            trial,
            won = settlement.won,
            pay = response.pay,
            "settled trial"
        );
        Ok(SettledTrial {
            response,
            settlement,
            stored,
        })
    }

    /// Store the strategy prompt response.
    pub async fn submit_strategy(
        &self,
        worker_id: &str,
        condition: &str,
        strategy: &str,
    ) -> Result<()> {
        self.store
            .upsert_strategy(worker_id, condition, strategy)
            .await?;
        Ok(())
    }

    /// Store one numeracy item, rejecting values outside the item's
    /// allowed range.
    pub async fn submit_numeracy_item(
        &self,
        worker_id: &str,
        item: usize,
        value: f64,
    ) -> Result<()> {
        let max = survey::item_maximum(item)
            .with_context(|| format!("numeracy item {item} does not exist"))?;
        if !value.is_finite() || value < 0.0 || value > max {
            bail!("numeracy item {item} must be between 0 and {max}");
        }
        self.store
            .upsert_numeracy_item(worker_id, item, value)
            .await?;
        Ok(())
    }

    /// Completeness of the strategy response, for the submit gate.
    pub async fn strategy_status(&self, worker_id: &str) -> Result<SurveyStatus> {
        let record = self.store.fetch_survey(worker_id).await?;
        Ok(survey::strategy_status(record.as_ref()))
    }

    /// Completeness of the numeracy survey, for the submit gate.
    pub async fn numeracy_status(&self, worker_id: &str) -> Result<SurveyStatus> {
        let record = self.store.fetch_survey(worker_id).await?;
        Ok(survey::numeracy_status(record.as_ref()))
    }

    /// Final page: total the settled non-practice payouts, record the
    /// bonus on the participant, and return the completion token.
    pub async fn final_summary(&self, worker_id: &str) -> Result<FinalSummary> {
        let worker = self
            .store
            .fetch_participant(worker_id)
            .await?
            .with_context(|| format!("no participant record for {worker_id}"))?;
        let responses = self.store.fetch_responses(worker_id).await?;
        if responses.is_empty() {
            bail!("no responses recorded for {worker_id}");
        }

        // Unsettled trials contribute nothing rather than their -1.0
        // sentinel.
        let total: f64 = responses
            .iter()
            .filter(|(key, _)| key.as_str() != "practice")
            .map(|(_, resp)| resp.pay.max(0.0))
            .sum();
        let total = round_cent(total);

        self.store.record_bonus(worker_id, total).await?;
        info!(worker = worker_id, bonus = total, "recorded final bonus");

        Ok(FinalSummary {
            token: worker.token,
            total_bonus: total,
        })
    }
}
