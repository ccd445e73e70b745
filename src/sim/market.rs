//! Market Simulator
//!
//! Owns one trading session against a slice of the price series: executes
//! orders with cash/holdings bookkeeping, fees and margin-call safety,
//! advances the cursor, and computes rewards. All session state is private
//! to the owning worker; an order either fully applies or is rejected
//! before any balance mutation.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::data::PriceSeries;
use crate::error::{PitError, Result};
use crate::sim::features::{FeatureSpec, FeatureWindow};

/// Portfolio fraction below which a short position is force-covered.
pub const MARGIN_CALL_FRACTION: f64 = 0.1;

/// Fraction of starting cash kept in reserve when sizing short sales.
pub const SHORT_RESERVE_FRACTION: f64 = 0.2;

/// Reward convention for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMode {
    /// Portfolio-value delta of the last step (primary convention).
    StepDelta,
    /// Portfolio-value change since episode start.
    CumulativeSinceStart,
}

impl Default for RewardMode {
    fn default() -> Self {
        RewardMode::StepDelta
    }
}

/// Simulator configuration, resolved once at episode reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Cash balance at episode start
    pub starting_cash: f64,
    /// Holdings at episode start
    pub starting_holdings: f64,
    /// Proportional fee charged on executed notional
    pub fee_rate: f64,
    /// Steps per episode
    pub episode_len: usize,
    /// Whether sells may exceed current holdings
    pub permit_short: bool,
    /// Reward convention
    #[serde(default)]
    pub reward_mode: RewardMode,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            starting_cash: 10_000.0,
            starting_holdings: 0.0,
            fee_rate: 0.0,
            episode_len: 1000,
            permit_short: false,
            reward_mode: RewardMode::StepDelta,
        }
    }
}

/// Mutable state of one trading session.
///
/// Owned exclusively by one [`MarketSimulator`]; reset at episode start,
/// discarded at episode end.
#[derive(Debug, Clone)]
struct SessionState {
    cursor: usize,
    cash: f64,
    holdings: f64,
    episode_start: usize,
    episode_end: usize,
    starting_value: f64,
    last_step_delta: f64,
}

/// Simulates order execution and state advance over a price-series slice.
pub struct MarketSimulator {
    series: Arc<PriceSeries>,
    features: FeatureSpec,
    config: SimulatorConfig,
    state: SessionState,
    rng: StdRng,
    worker: usize,
    episode_seq: u64,
}

impl MarketSimulator {
    pub fn new(
        series: Arc<PriceSeries>,
        features: FeatureSpec,
        config: SimulatorConfig,
        worker: usize,
        seed: u64,
    ) -> Self {
        let state = SessionState {
            cursor: 0,
            cash: config.starting_cash,
            holdings: config.starting_holdings,
            episode_start: 0,
            episode_end: 0,
            starting_value: config.starting_cash,
            last_step_delta: 0.0,
        };
        Self {
            series,
            features,
            config,
            state,
            rng: StdRng::seed_from_u64(seed),
            worker,
            episode_seq: 0,
        }
    }

    /// Begin a new episode at `start`.
    ///
    /// The episode covers cursors `start ..= start + episode_len`, clamped
    /// to the series end; `start + episode_len` past the series length is
    /// rejected outright.
    pub fn reset(&mut self, start: usize) -> Result<FeatureWindow> {
        if start + self.config.episode_len > self.series.len() {
            return Err(PitError::EpisodeRange(format!(
                "episode [{}, {}) exceeds series length {}",
                start,
                start + self.config.episode_len,
                self.series.len()
            )));
        }

        self.episode_seq += 1;
        let cash = self.config.starting_cash;
        let holdings = self.config.starting_holdings;
        let starting_value = cash + holdings * self.series.price(start);
        self.state = SessionState {
            cursor: start,
            cash,
            holdings,
            episode_start: start,
            episode_end: (start + self.config.episode_len).min(self.series.len() - 1),
            starting_value,
            last_step_delta: 0.0,
        };
        Ok(self.feature_window())
    }

    /// Advance the cursor by one tick.
    ///
    /// Returns `Ok(None)` as the terminal signal once the episode (or the
    /// series) is exhausted. A non-finite or non-positive price at the new
    /// cursor aborts the episode with an execution error.
    pub fn step(&mut self) -> Result<Option<FeatureWindow>> {
        let next = self.state.cursor + 1;
        if next > self.state.episode_end || next >= self.series.len() {
            return Ok(None);
        }

        let price = self.series.price(next);
        if !price.is_finite() || price <= 0.0 {
            return Err(self.execution_error(format!("invalid price {} at tick {}", price, next)));
        }

        let value_before = self.portfolio_value();
        self.state.cursor = next;
        self.state.last_step_delta = self.portfolio_value() - value_before;
        Ok(Some(self.feature_window()))
    }

    /// Observation vector at the current cursor.
    pub fn feature_window(&self) -> FeatureWindow {
        self.features.window(&self.series, self.state.cursor)
    }

    /// Whether the next [`step`](Self::step) would signal episode end.
    pub fn is_terminal(&self) -> bool {
        let next = self.state.cursor + 1;
        next > self.state.episode_end || next >= self.series.len()
    }

    /// Interpret a raw policy output and execute the implied order.
    ///
    /// The action is clamped to `[-1, 1]` and, when `exploration_sd > 0`,
    /// resampled from `Normal(action, exploration_sd)` clipped to the same
    /// bound. A margin call pre-empts the requested order: with shorting
    /// enabled, a portfolio below `MARGIN_CALL_FRACTION` of starting cash
    /// while short forces a full buy-back and skips the order this step.
    /// Returns the realized action for rollout recording.
    pub fn interpret_action(&mut self, raw: f64, exploration_sd: f64) -> Result<f64> {
        let mut action = raw.clamp(-1.0, 1.0);
        if exploration_sd > 0.0 {
            let normal = Normal::new(action, exploration_sd)
                .map_err(|e| self.execution_error(format!("exploration sampling: {}", e)))?;
            action = normal.sample(&mut self.rng).clamp(-1.0, 1.0);
        }

        let price = self.price();
        if self.config.permit_short
            && self.portfolio_value() < MARGIN_CALL_FRACTION * self.config.starting_cash
            && self.state.holdings < 0.0
        {
            let cover = -self.state.holdings;
            self.buy_units(cover);
            return Ok(action);
        }

        if action < 0.0 {
            let units = if self.config.permit_short {
                let sellable =
                    self.portfolio_value() - SHORT_RESERVE_FRACTION * self.config.starting_cash;
                (sellable / price) * action.abs()
            } else {
                self.state.holdings * action.abs()
            };
            self.sell_units(units);
        } else if action > 0.0 {
            self.buy_currency(self.state.cash * action);
        }

        Ok(action)
    }

    /// Spend up to `amount` currency on holdings at the current price.
    pub fn buy_currency(&mut self, amount: f64) {
        let cost = amount.max(0.0).min(self.state.cash);
        self.state.cash -= cost;
        self.state.holdings += cost * (1.0 - self.config.fee_rate) / self.price();
    }

    /// Buy `units` of the asset, capped by available cash.
    pub fn buy_units(&mut self, units: f64) {
        self.buy_currency(units.max(0.0) * self.price());
    }

    /// Sell `units` of the asset. Proceeds are capped at current holdings
    /// unless shorting is enabled.
    pub fn sell_units(&mut self, units: f64) {
        let price = self.price();
        let notional = units.max(0.0) * price;
        let proceeds = if self.config.permit_short {
            notional
        } else {
            notional.min(self.state.holdings.max(0.0) * price)
        };
        self.state.cash += proceeds * (1.0 - self.config.fee_rate);
        self.state.holdings -= proceeds / price;
    }

    pub fn price(&self) -> f64 {
        self.series.price(self.state.cursor)
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    pub fn cash(&self) -> f64 {
        self.state.cash
    }

    pub fn holdings(&self) -> f64 {
        self.state.holdings
    }

    pub fn portfolio_value(&self) -> f64 {
        self.state.cash + self.state.holdings * self.price()
    }

    /// Reward of the last completed step, per the configured convention.
    pub fn reward(&self) -> f64 {
        match self.config.reward_mode {
            RewardMode::StepDelta => self.state.last_step_delta,
            RewardMode::CumulativeSinceStart => self.portfolio_value() - self.state.starting_value,
        }
    }

    /// Portfolio gain since episode start.
    pub fn profit(&self) -> f64 {
        self.portfolio_value() - self.state.starting_value
    }

    /// Gain a buy-and-hold strategy would have realized over this episode.
    pub fn buy_and_hold_baseline(&self) -> f64 {
        let start_price = self.series.price(self.state.episode_start);
        let end_price = self.series.price(self.state.episode_end);
        self.config.starting_cash * (end_price / start_price) - self.config.starting_cash
    }

    pub fn episode_start(&self) -> usize {
        self.state.episode_start
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    fn execution_error(&self, reason: String) -> PitError {
        PitError::Execution {
            worker: self.worker,
            episode: self.episode_seq,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PriceSeries;

    fn flat_series(len: usize, price: f64) -> Arc<PriceSeries> {
        let ticks = (0..len)
            .map(|i| crate::data::Tick {
                timestamp: i as i64,
                price,
                side: crate::data::Side::Buy,
                size: None,
            })
            .collect();
        Arc::new(PriceSeries::from_ticks(ticks, 100.0).unwrap())
    }

    fn simulator(series: Arc<PriceSeries>, config: SimulatorConfig) -> MarketSimulator {
        MarketSimulator::new(series, FeatureSpec::new(vec![1]), config, 0, 7)
    }

    #[test]
    fn test_buy_arithmetic() {
        let config = SimulatorConfig {
            starting_cash: 1000.0,
            fee_rate: 0.01,
            episode_len: 4,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 10.0), config);
        sim.reset(0).unwrap();

        sim.buy_currency(500.0);
        assert!((sim.cash() - 500.0).abs() < 1e-9);
        assert!((sim.holdings() - 500.0 * 0.99 / 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_buy_capped_by_cash() {
        let config = SimulatorConfig {
            starting_cash: 100.0,
            episode_len: 4,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 10.0), config);
        sim.reset(0).unwrap();

        sim.buy_currency(1_000.0);
        assert_eq!(sim.cash(), 0.0);
        assert!((sim.holdings() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_sell_arithmetic() {
        let config = SimulatorConfig {
            starting_cash: 0.0,
            starting_holdings: 8.0,
            fee_rate: 0.01,
            episode_len: 4,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 10.0), config);
        sim.reset(0).unwrap();

        sim.sell_units(3.0);
        assert!((sim.holdings() - 5.0).abs() < 1e-9);
        assert!((sim.cash() - 3.0 * 10.0 * 0.99).abs() < 1e-9);
    }

    #[test]
    fn test_sell_capped_by_holdings_without_shorting() {
        let config = SimulatorConfig {
            starting_cash: 0.0,
            starting_holdings: 2.0,
            episode_len: 4,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 10.0), config);
        sim.reset(0).unwrap();

        sim.sell_units(100.0);
        assert!(sim.holdings().abs() < 1e-9);
        assert!((sim.cash() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_fee_drag() {
        let config = SimulatorConfig {
            starting_cash: 1000.0,
            fee_rate: 0.002,
            episode_len: 4,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 25.0), config);
        sim.reset(0).unwrap();
        let before = sim.portfolio_value();

        sim.buy_currency(1000.0);
        sim.sell_units(sim.holdings());
        assert!(sim.portfolio_value() < before);

        // and equality with zero fee
        let config = SimulatorConfig {
            starting_cash: 1000.0,
            fee_rate: 0.0,
            episode_len: 4,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 25.0), config);
        sim.reset(0).unwrap();
        let before = sim.portfolio_value();
        sim.buy_currency(1000.0);
        sim.sell_units(sim.holdings());
        assert!((sim.portfolio_value() - before).abs() < 1e-9);
    }

    #[test]
    fn test_margin_call_not_triggered_above_threshold() {
        let config = SimulatorConfig {
            starting_cash: 1000.0,
            permit_short: true,
            episode_len: 4,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 10.0), config);
        sim.reset(0).unwrap();
        sim.state.holdings = -5.0;
        // portfolio value 1000 - 50 = 950 >= 100: no forced cover
        sim.interpret_action(0.0, 0.0).unwrap();
        assert!((sim.holdings() + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_margin_call_forces_cover() {
        let config = SimulatorConfig {
            starting_cash: 1000.0,
            permit_short: true,
            episode_len: 4,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 10.0), config);
        sim.reset(0).unwrap();
        sim.state.holdings = -95.0;
        // portfolio value 1000 - 950 = 50 < 100: forced buy-back to flat
        sim.interpret_action(-1.0, 0.0).unwrap();
        assert!(sim.holdings().abs() < 1e-9);
    }

    #[test]
    fn test_reset_rejects_out_of_range_episode() {
        let config = SimulatorConfig {
            episode_len: 100,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(64, 10.0), config);
        let err = sim.reset(0).unwrap_err();
        assert!(matches!(err, PitError::EpisodeRange(_)));
    }

    #[test]
    fn test_step_terminal_at_episode_end() {
        let config = SimulatorConfig {
            episode_len: 3,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 10.0), config);
        sim.reset(0).unwrap();

        assert!(sim.step().unwrap().is_some());
        assert!(sim.step().unwrap().is_some());
        assert!(sim.step().unwrap().is_some());
        assert!(sim.step().unwrap().is_none());
        assert_eq!(sim.cursor(), 3);
    }

    #[test]
    fn test_cursor_strictly_increases() {
        let config = SimulatorConfig {
            episode_len: 8,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 10.0), config);
        sim.reset(2).unwrap();
        let mut prev = sim.cursor();
        while sim.step().unwrap().is_some() {
            assert!(sim.cursor() > prev);
            prev = sim.cursor();
        }
    }

    #[test]
    fn test_step_delta_reward() {
        let ticks = vec![10.0, 12.0, 9.0]
            .into_iter()
            .enumerate()
            .map(|(i, price)| crate::data::Tick {
                timestamp: i as i64,
                price,
                side: crate::data::Side::Buy,
                size: None,
            })
            .collect();
        let series = Arc::new(PriceSeries::from_ticks(ticks, 100.0).unwrap());
        let config = SimulatorConfig {
            starting_cash: 0.0,
            starting_holdings: 10.0,
            episode_len: 2,
            ..Default::default()
        };
        let mut sim = simulator(series, config);
        sim.reset(0).unwrap();

        sim.step().unwrap();
        assert!((sim.reward() - 20.0).abs() < 1e-9);
        sim.step().unwrap();
        assert!((sim.reward() + 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_reward_mode() {
        let ticks = vec![10.0, 12.0, 9.0]
            .into_iter()
            .enumerate()
            .map(|(i, price)| crate::data::Tick {
                timestamp: i as i64,
                price,
                side: crate::data::Side::Buy,
                size: None,
            })
            .collect();
        let series = Arc::new(PriceSeries::from_ticks(ticks, 100.0).unwrap());
        let config = SimulatorConfig {
            starting_cash: 0.0,
            starting_holdings: 10.0,
            episode_len: 2,
            reward_mode: RewardMode::CumulativeSinceStart,
            ..Default::default()
        };
        let mut sim = simulator(series, config);
        sim.reset(0).unwrap();

        sim.step().unwrap();
        sim.step().unwrap();
        assert!((sim.reward() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_cash_never_negative_under_short_reserve() {
        let config = SimulatorConfig {
            starting_cash: 1000.0,
            permit_short: true,
            episode_len: 8,
            ..Default::default()
        };
        let mut sim = simulator(flat_series(16, 10.0), config);
        sim.reset(0).unwrap();

        for raw in [-1.0, 1.0, -0.5, 0.5, -1.0] {
            sim.interpret_action(raw, 0.0).unwrap();
            assert!(sim.cash() >= 0.0);
        }
    }
}
