//! Episode Metrics
//!
//! Per-episode records handed to an external metrics sink. The default
//! sink emits structured tracing events; an in-memory sink is provided
//! for tests and summaries.

use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

/// Everything reported about one completed episode.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeRecord {
    pub episode_id: u64,
    pub worker_id: usize,
    /// Sum of step rewards over the episode
    pub reward: f64,
    /// Final portfolio value minus starting cash
    pub profit: f64,
    /// Profit minus the buy-and-hold baseline
    pub profit_over_baseline: f64,
    /// Policy loss of the episode's last sync
    pub policy_loss: f64,
    /// Value loss of the episode's last sync
    pub value_loss: f64,
    /// Action mean predicted at the final step
    pub action_mean: f64,
    /// Action std-dev predicted at the final step
    pub action_sd: f64,
}

/// Receiver of per-episode records.
pub trait MetricsSink: Send + Sync {
    fn record(&self, record: &EpisodeRecord);
}

/// Default sink: one structured tracing event per episode.
#[derive(Debug, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&self, record: &EpisodeRecord) {
        info!(
            episode = record.episode_id,
            worker = record.worker_id,
            reward = record.reward,
            profit = record.profit,
            above_baseline = record.profit_over_baseline,
            policy_loss = record.policy_loss,
            value_loss = record.value_loss,
            action_mean = record.action_mean,
            action_sd = record.action_sd,
            "episode complete"
        );
    }
}

/// Sink that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<EpisodeRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EpisodeRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsSink for MemorySink {
    fn record(&self, record: &EpisodeRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}
