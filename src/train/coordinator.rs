//! Worker Coordination
//!
//! Runs N workers in parallel, each pairing a private market simulator
//! with a local parameter snapshot. The coordinator owns the episode
//! bookkeeping: it receives per-episode reports over a channel, feeds the
//! metrics sink, writes boundary checkpoints, raises the stop flag once
//! the episode budget is spent, and joins all workers. The only shared
//! mutable resource is the model's parameter set, serialized inside the
//! model itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use tracing::{info, warn};

use crate::config::{CheckpointConfig, TrainingConfig};
use crate::error::Result;
use crate::metrics::MetricsSink;
use crate::model::PolicyValueModel;
use crate::sim::{EpisodeSampler, FeatureSpec, MarketSimulator, SimulatorConfig};
use crate::train::checkpoint::Checkpointer;
use crate::train::worker::Worker;
use crate::data::PriceSeries;

/// Shared training bookkeeping: the global episode counter and the
/// cooperative stop flag. Replaces free-floating globals with one object
/// and a defined synchronization discipline.
pub struct TrainingState {
    episodes: AtomicU64,
    stop: AtomicBool,
    max_episodes: u64,
}

impl TrainingState {
    pub fn new(max_episodes: u64, completed_episodes: u64) -> Self {
        Self {
            episodes: AtomicU64::new(completed_episodes),
            stop: AtomicBool::new(false),
            max_episodes,
        }
    }

    /// Episodes completed so far across all workers.
    pub fn episode_count(&self) -> u64 {
        self.episodes.load(Ordering::Relaxed)
    }

    /// Register one completed episode; returns its id.
    pub fn complete_episode(&self) -> u64 {
        self.episodes.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn budget_exhausted(&self) -> bool {
        self.episode_count() >= self.max_episodes
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

/// Owns the worker fleet for one training run.
pub struct WorkerCoordinator {
    series: Arc<PriceSeries>,
    sampler: Arc<EpisodeSampler>,
    model: Arc<dyn PolicyValueModel>,
    sink: Arc<dyn MetricsSink>,
    features: FeatureSpec,
    simulator: SimulatorConfig,
    training: TrainingConfig,
    checkpointer: Option<Checkpointer>,
    checkpoint_interval: u64,
    state: Arc<TrainingState>,
}

impl WorkerCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        series: Arc<PriceSeries>,
        sampler: Arc<EpisodeSampler>,
        model: Arc<dyn PolicyValueModel>,
        sink: Arc<dyn MetricsSink>,
        features: FeatureSpec,
        simulator: SimulatorConfig,
        training: TrainingConfig,
        checkpoint: Option<(Checkpointer, &CheckpointConfig)>,
        completed_episodes: u64,
    ) -> Self {
        let max_episodes = training.max_episodes;
        let (checkpointer, checkpoint_interval) = match checkpoint {
            Some((checkpointer, config)) => (Some(checkpointer), config.interval.max(1)),
            None => (None, u64::MAX),
        };
        Self {
            series,
            sampler,
            model,
            sink,
            features,
            simulator,
            training,
            checkpointer,
            checkpoint_interval,
            state: Arc::new(TrainingState::new(max_episodes, completed_episodes)),
        }
    }

    pub fn state(&self) -> &Arc<TrainingState> {
        &self.state
    }

    /// Run all workers to completion of the episode budget (or an external
    /// stop request) and return the number of completed episodes.
    pub fn run(&self) -> Result<u64> {
        let (report_tx, report_rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(self.training.workers);

        for id in 0..self.training.workers {
            let simulator = MarketSimulator::new(
                self.series.clone(),
                self.features.clone(),
                self.simulator.clone(),
                id,
                self.training.seed.wrapping_add(id as u64),
            );
            let worker = Worker::new(
                id,
                simulator,
                self.sampler.clone(),
                self.model.clone(),
                self.state.clone(),
                report_tx.clone(),
                &self.training,
            );
            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker.run())?;
            handles.push(handle);
        }
        // workers hold the remaining senders; the loop below ends when the
        // last one exits
        drop(report_tx);

        info!(
            workers = self.training.workers,
            max_episodes = self.training.max_episodes,
            "training started"
        );

        let mut last_checkpoint = self.state.episode_count();
        for record in report_rx {
            self.sink.record(&record);

            let episode = record.episode_id;
            if episode >= self.training.max_episodes {
                self.state.request_stop();
            }
            // the reporting worker is between syncs here, and the pull
            // below shares the model's update lock, so the snapshot can
            // never observe a half-applied update
            if episode / self.checkpoint_interval > last_checkpoint / self.checkpoint_interval {
                last_checkpoint = episode;
                self.write_checkpoint(episode);
            }
        }

        for (id, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(worker = id, error = %err, "worker exited with error"),
                Err(_) => warn!(worker = id, "worker panicked"),
            }
        }

        let episodes = self.state.episode_count();
        self.write_checkpoint(episodes);
        info!(episodes, "training finished");
        Ok(episodes)
    }

    /// Snapshot the fully-synced parameters. Persistence failures are
    /// logged and training continues; the next attempt supersedes.
    fn write_checkpoint(&self, episode: u64) {
        let Some(checkpointer) = &self.checkpointer else {
            return;
        };
        let snapshot = match self.model.pull() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(episode, error = %err, "checkpoint pull failed");
                return;
            }
        };
        match checkpointer.save(episode, &snapshot) {
            Ok(path) => info!(episode, path = %path.display(), "checkpoint written"),
            Err(err) => warn!(episode, error = %err, "checkpoint write failed"),
        }
    }
}
