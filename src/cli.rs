//! Command-Line Interface
//!
//! Argument parsing and the wiring behind each subcommand: dataset load,
//! sampler/model/coordinator assembly, checkpoint resume, and the
//! post-training validation pass.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::data::PriceSeries;
use crate::error::Result;
use crate::metrics::{MetricsSink, TracingSink};
use crate::model::{LinearGaussianModel, PolicyValueModel};
use crate::sim::EpisodeSampler;
use crate::train::{run_validation, Checkpointer, WorkerCoordinator};

#[derive(Parser)]
#[command(name = "pit", version, about = "Actor-critic trainer for tick-level trading policies")]
pub struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    pub config_dir: String,

    /// Tick data CSV, overriding the configured path
    #[arg(long, global = true)]
    pub data: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a policy against historical ticks
    Train {
        /// Episode budget, overriding the configured value
        #[arg(long)]
        episodes: Option<u64>,
        /// Worker count, overriding the configured value
        #[arg(long)]
        workers: Option<usize>,
        /// Resume from the latest checkpoint
        #[arg(long)]
        resume: bool,
    },
    /// Evaluate the latest checkpoint on the holdout windows
    Validate,
    /// Print a summary of a tick dataset
    Inspect,
}

/// Full training run: coordinator to episode-budget completion, then a
/// greedy validation pass over the holdouts.
pub fn run_train(config: &AppConfig, resume: bool) -> Result<()> {
    let series = load_series(config)?;
    let sampler = Arc::new(EpisodeSampler::new(series.len(), &config.sampler)?);
    let model = Arc::new(LinearGaussianModel::new(config.model.clone()));
    let checkpointer =
        Checkpointer::new(&config.checkpoint.dir, config.checkpoint.max_checkpoints);

    let mut completed_episodes = 0;
    if resume {
        match checkpointer.load_latest()? {
            Some(checkpoint) => {
                model.restore(&checkpoint.params)?;
                completed_episodes = checkpoint.episode;
                info!(episode = completed_episodes, "resumed from checkpoint");
            }
            None => warn!(
                dir = %config.checkpoint.dir,
                "no checkpoint to resume from, starting fresh"
            ),
        }
    }

    let coordinator = WorkerCoordinator::new(
        series.clone(),
        sampler.clone(),
        model.clone() as Arc<dyn PolicyValueModel>,
        Arc::new(TracingSink) as Arc<dyn MetricsSink>,
        config.features.clone(),
        config.simulator.clone(),
        config.training.clone(),
        Some((checkpointer, &config.checkpoint)),
        completed_episodes,
    );
    let episodes = coordinator.run()?;
    println!("Training finished after {} episodes", episodes);

    let summary = run_validation(
        series,
        &sampler,
        model.as_ref(),
        config.features.clone(),
        config.simulator.clone(),
    )?;
    println!(
        "Validation over {} holdouts: profit {:.2}, buy-and-hold {:.2}",
        summary.episodes.len(),
        summary.total_profit,
        summary.total_buy_and_hold
    );
    Ok(())
}

/// Standalone validation of the latest checkpoint.
pub fn run_validate(config: &AppConfig) -> Result<()> {
    let series = load_series(config)?;
    let sampler = EpisodeSampler::new(series.len(), &config.sampler)?;
    let model = LinearGaussianModel::new(config.model.clone());

    let checkpointer =
        Checkpointer::new(&config.checkpoint.dir, config.checkpoint.max_checkpoints);
    match checkpointer.load_latest()? {
        Some(checkpoint) => {
            model.restore(&checkpoint.params)?;
            info!(episode = checkpoint.episode, "evaluating checkpoint");
        }
        None => warn!(
            dir = %config.checkpoint.dir,
            "no checkpoint found, evaluating freshly initialized parameters"
        ),
    }

    let summary = run_validation(
        series,
        &sampler,
        &model,
        config.features.clone(),
        config.simulator.clone(),
    )?;

    for episode in &summary.episodes {
        println!(
            "holdout @{:>8}  profit {:>12.2}  buy-and-hold {:>12.2}",
            episode.start, episode.profit, episode.buy_and_hold
        );
    }
    println!(
        "total profit (policy):       {:.2}",
        summary.total_profit
    );
    println!(
        "total profit (buy and hold): {:.2}",
        summary.total_buy_and_hold
    );
    Ok(())
}

/// Dataset summary for a quick sanity check before training.
pub fn run_inspect(config: &AppConfig) -> Result<()> {
    let series = load_series(config)?;

    let first = series.tick(0);
    let last = series.tick(series.len() - 1);
    let (mut lo, mut hi) = (f64::MAX, f64::MIN);
    for i in 0..series.len() {
        let price = series.price(i);
        lo = lo.min(price);
        hi = hi.max(price);
    }

    println!("ticks:      {}", series.len());
    println!(
        "timespan:   {} .. {}",
        format_timestamp(first.timestamp),
        format_timestamp(last.timestamp)
    );
    println!("price:      {:.4} .. {:.4}", lo, hi);
    println!(
        "episodes:   {} holdouts of {} steps reserved",
        config.sampler.holdout_count, config.sampler.episode_len
    );
    Ok(())
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

fn load_series(config: &AppConfig) -> Result<Arc<PriceSeries>> {
    let series = PriceSeries::load_csv(&config.data.path, config.data.log_scale)?;
    let series = match config.data.resample_secs {
        Some(secs) => series.resample(secs)?,
        None => series,
    };
    info!(path = %config.data.path, ticks = series.len(), "series loaded");
    Ok(Arc::new(series))
}
