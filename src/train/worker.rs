//! Training Worker
//!
//! One worker pairs a private market simulator with a local parameter
//! snapshot and runs the rollout/sync/pull cycle: collect up to
//! `sync_interval` steps, push the discounted batch into the shared
//! model, refresh the local snapshot, repeat until the episode ends.
//! Sync failures are retried once and then kill only this worker;
//! execution failures abort only the current episode.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::TrainingConfig;
use crate::error::{PitError, Result};
use crate::metrics::EpisodeRecord;
use crate::model::{HiddenState, ParameterSet, PolicyValueModel, Prediction, SyncOutcome, TrainBatch};
use crate::sim::{EpisodeSampler, MarketSimulator};
use crate::train::coordinator::TrainingState;
use crate::train::rollout::{RolloutBuffer, StepSample};

pub struct Worker {
    id: usize,
    simulator: MarketSimulator,
    sampler: Arc<EpisodeSampler>,
    model: Arc<dyn PolicyValueModel>,
    state: Arc<TrainingState>,
    reports: Sender<EpisodeRecord>,
    sync_interval: usize,
    gamma: f64,
}

impl Worker {
    pub fn new(
        id: usize,
        simulator: MarketSimulator,
        sampler: Arc<EpisodeSampler>,
        model: Arc<dyn PolicyValueModel>,
        state: Arc<TrainingState>,
        reports: Sender<EpisodeRecord>,
        config: &TrainingConfig,
    ) -> Self {
        Self {
            id,
            simulator,
            sampler,
            model,
            state,
            reports,
            sync_interval: config.sync_interval.max(1),
            gamma: config.gamma,
        }
    }

    /// Run episodes until the stop flag is set or the episode budget is
    /// exhausted. Returns `Err` only for worker-fatal failures.
    pub fn run(mut self) -> Result<()> {
        while !self.state.stop_requested() && !self.state.budget_exhausted() {
            match self.run_episode() {
                Ok(()) => {}
                Err(err) if err.is_episode_fatal_only() => {
                    warn!(worker = self.id, error = %err, "episode aborted");
                }
                Err(err) => {
                    warn!(worker = self.id, error = %err, "worker stopping on fatal error");
                    return Err(err);
                }
            }
        }
        debug!(worker = self.id, "worker terminal");
        Ok(())
    }

    /// One full episode of the COLLECTING/SYNCING cycle.
    fn run_episode(&mut self) -> Result<()> {
        // IDLE -> COLLECTING: fresh snapshot, fresh episode window
        let mut params = self.pull_with_retry()?;
        let start = self.sampler.next_training_start()?;
        let mut window = self.simulator.reset(start)?;
        let mut hidden = HiddenState::empty();
        let mut buffer = RolloutBuffer::with_capacity(self.sync_interval);

        let mut episode_reward = 0.0;
        let mut last_outcome = SyncOutcome::default();
        let mut last_prediction: Option<Prediction> = None;
        let mut terminal = false;
        let mut stopping = false;

        while !terminal && !stopping {
            // COLLECTING
            for _ in 0..self.sync_interval {
                let (prediction, next_hidden) = self.model.predict(&params, &window, &hidden);
                let action = self
                    .simulator
                    .interpret_action(prediction.action_mean, prediction.action_sd)?;
                let next = match self.simulator.step()? {
                    Some(next) => next,
                    None => {
                        terminal = true;
                        break;
                    }
                };
                let reward = self.simulator.reward();

                episode_reward += reward;
                buffer.push(StepSample {
                    features: window,
                    action,
                    reward,
                    value: prediction.value,
                });
                last_prediction = Some(prediction);
                hidden = next_hidden;
                window = next;

                if self.simulator.is_terminal() {
                    terminal = true;
                    break;
                }
                // the order above has fully applied; safe to stop here
                if self.state.stop_requested() {
                    stopping = true;
                    break;
                }
            }

            // SYNCING
            if !buffer.is_empty() {
                let bootstrap = if terminal {
                    0.0
                } else {
                    self.model.predict(&params, &window, &hidden).0.value
                };
                let batch = buffer.drain_batch(self.gamma, bootstrap);
                last_outcome = self.apply_with_retry(&batch)?;
                params = self.pull_with_retry()?;
            }

            if self.state.stop_requested() {
                stopping = true;
            }
        }

        if !terminal {
            // stopped mid-episode; collected steps are already synced
            return Ok(());
        }

        // Episode completion
        let prediction = match last_prediction {
            Some(prediction) => prediction,
            // zero-length episode; nothing to report
            None => return Ok(()),
        };
        let profit = self.simulator.profit();
        let baseline = self.simulator.buy_and_hold_baseline();
        let episode_id = self.state.complete_episode();

        let record = EpisodeRecord {
            episode_id,
            worker_id: self.id,
            reward: episode_reward,
            profit,
            profit_over_baseline: profit - baseline,
            policy_loss: last_outcome.policy_loss,
            value_loss: last_outcome.value_loss,
            action_mean: prediction.action_mean,
            action_sd: prediction.action_sd,
        };
        // coordinator gone means shutdown is in progress; drop silently
        let _ = self.reports.send(record);
        Ok(())
    }

    fn apply_with_retry(&self, batch: &TrainBatch) -> Result<SyncOutcome> {
        match self.model.apply_gradients(batch) {
            Ok(outcome) => Ok(outcome),
            Err(first) => {
                warn!(worker = self.id, error = %first, "apply_gradients failed, retrying once");
                self.model.apply_gradients(batch).map_err(|err| {
                    PitError::Sync(format!(
                        "worker {}: apply_gradients retry failed: {} (first failure: {})",
                        self.id, err, first
                    ))
                })
            }
        }
    }

    fn pull_with_retry(&self) -> Result<ParameterSet> {
        match self.model.pull() {
            Ok(params) => Ok(params),
            Err(first) => {
                warn!(worker = self.id, error = %first, "pull failed, retrying once");
                self.model.pull().map_err(|err| {
                    PitError::Sync(format!(
                        "worker {}: pull retry failed: {} (first failure: {})",
                        self.id, err, first
                    ))
                })
            }
        }
    }
}
