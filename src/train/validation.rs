//! Holdout Validation
//!
//! Greedy evaluation over the reserved holdout windows: mean actions, no
//! sampling, no parameter updates. Reports per-episode profit against the
//! buy-and-hold baseline.

use std::sync::Arc;

use tracing::info;

use crate::data::PriceSeries;
use crate::error::Result;
use crate::model::{HiddenState, PolicyValueModel};
use crate::sim::{EpisodeSampler, FeatureSpec, MarketSimulator, SimulatorConfig};

/// Outcome of one holdout episode.
#[derive(Debug, Clone)]
pub struct ValidationEpisode {
    pub start: usize,
    pub profit: f64,
    pub buy_and_hold: f64,
}

/// Outcome of a full validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    pub episodes: Vec<ValidationEpisode>,
    pub total_profit: f64,
    pub total_buy_and_hold: f64,
}

/// Run every reserved holdout window once with greedy actions.
pub fn run_validation(
    series: Arc<PriceSeries>,
    sampler: &EpisodeSampler,
    model: &dyn PolicyValueModel,
    features: FeatureSpec,
    config: SimulatorConfig,
) -> Result<ValidationSummary> {
    let params = model.pull()?;
    let mut simulator = MarketSimulator::new(series, features, config, 0, 0);
    let mut summary = ValidationSummary::default();

    for holdout in 0..sampler.holdout_count() {
        let start = sampler.next_holdout_start();
        let mut window = simulator.reset(start)?;
        let mut hidden = HiddenState::empty();

        loop {
            let (prediction, next_hidden) = model.predict(&params, &window, &hidden);
            // greedy: act on the mean, never sample
            simulator.interpret_action(prediction.action_mean, 0.0)?;
            match simulator.step()? {
                Some(next) => window = next,
                None => break,
            }
            hidden = next_hidden;
        }

        let episode = ValidationEpisode {
            start,
            profit: simulator.profit(),
            buy_and_hold: simulator.buy_and_hold_baseline(),
        };
        info!(
            holdout,
            start,
            profit = episode.profit,
            buy_and_hold = episode.buy_and_hold,
            "holdout episode"
        );
        summary.total_profit += episode.profit;
        summary.total_buy_and_hold += episode.buy_and_hold;
        summary.episodes.push(episode);
    }

    info!(
        episodes = summary.episodes.len(),
        total_profit = summary.total_profit,
        total_buy_and_hold = summary.total_buy_and_hold,
        "validation complete"
    );
    Ok(summary)
}
