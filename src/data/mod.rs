//! Tick Series Loading
//!
//! Loads historical tick data and derives the log-price series the
//! simulator and feature windows are computed from. A series is loaded
//! once, validated, and never mutated afterwards.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PitError, Result};

/// Scale applied to log prices so per-tick changes land in a trainable range.
pub const DEFAULT_LOG_SCALE: f64 = 100.0;

/// Aggressor side of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Numeric indicator used in feature windows: +1 buy, -1 sell.
    pub fn indicator(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

/// A single trade tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Tick {
    /// Epoch timestamp in seconds
    pub timestamp: i64,
    /// Trade price, strictly positive
    pub price: f64,
    /// Aggressor side
    pub side: Side,
    /// Trade size, if the feed provides it
    #[serde(default)]
    pub size: Option<f64>,
}

/// Immutable tick series with derived log prices.
///
/// `log_prices[i] = ln(price[i]) * log_scale`; the scale keeps per-tick
/// log changes in a range the policy can learn from without per-feature
/// normalization.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    ticks: Vec<Tick>,
    log_prices: Vec<f64>,
    log_scale: f64,
}

impl PriceSeries {
    /// Build a series from raw ticks, validating the dataset invariants:
    /// non-empty, strictly positive finite prices, non-decreasing timestamps.
    pub fn from_ticks(ticks: Vec<Tick>, log_scale: f64) -> Result<Self> {
        if ticks.is_empty() {
            return Err(PitError::Data("empty tick series".to_string()));
        }

        let mut prev_ts = i64::MIN;
        for (i, tick) in ticks.iter().enumerate() {
            if !tick.price.is_finite() || tick.price <= 0.0 {
                return Err(PitError::Data(format!(
                    "non-positive price {} at tick {}",
                    tick.price, i
                )));
            }
            if tick.timestamp < prev_ts {
                return Err(PitError::Data(format!(
                    "timestamp regression at tick {}: {} < {}",
                    i, tick.timestamp, prev_ts
                )));
            }
            prev_ts = tick.timestamp;
        }

        let log_prices = ticks.iter().map(|t| t.price.ln() * log_scale).collect();

        Ok(Self {
            ticks,
            log_prices,
            log_scale,
        })
    }

    /// Load a series from a CSV file with columns `timestamp,price,side[,size]`.
    pub fn load_csv<P: AsRef<Path>>(path: P, log_scale: f64) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path.as_ref())?;
        let mut ticks = Vec::new();
        for record in reader.deserialize() {
            let tick: Tick = record?;
            ticks.push(tick);
        }
        Self::from_ticks(ticks, log_scale)
    }

    /// Number of ticks.
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn tick(&self, i: usize) -> &Tick {
        &self.ticks[i]
    }

    pub fn price(&self, i: usize) -> f64 {
        self.ticks[i].price
    }

    pub fn side(&self, i: usize) -> Side {
        self.ticks[i].side
    }

    /// Scaled log price at index `i`.
    pub fn log_price(&self, i: usize) -> f64 {
        self.log_prices[i]
    }

    pub fn log_scale(&self) -> f64 {
        self.log_scale
    }

    /// Collapse the series to one tick per fixed time interval.
    ///
    /// Intervals without trades repeat the previous tick so downstream
    /// indices still advance one interval per step.
    pub fn resample(&self, interval_secs: i64) -> Result<Self> {
        if interval_secs <= 0 {
            return Err(PitError::Data(format!(
                "resample interval must be positive, got {}",
                interval_secs
            )));
        }

        let mut resampled: Vec<Tick> = Vec::new();
        let mut target = round_to_interval(self.ticks[0].timestamp, interval_secs);
        let mut last: Option<Tick> = None;

        for tick in &self.ticks {
            while tick.timestamp >= target + interval_secs {
                // fill empty intervals with the last observed tick
                if let Some(mut fill) = last {
                    fill.timestamp = target;
                    fill.size = None;
                    resampled.push(fill);
                }
                target += interval_secs;
            }
            last = Some(*tick);
        }
        if let Some(mut fill) = last {
            fill.timestamp = target;
            resampled.push(fill);
        }

        Self::from_ticks(resampled, self.log_scale)
    }

    /// Deterministic synthetic series with constant per-tick growth.
    ///
    /// Used by the inspect command and by tests that need a series with a
    /// closed-form buy-and-hold outcome.
    pub fn synthetic_growth(len: usize, start_price: f64, growth_per_tick: f64) -> Result<Self> {
        let mut ticks = Vec::with_capacity(len);
        let mut price = start_price;
        for i in 0..len {
            ticks.push(Tick {
                timestamp: i as i64,
                price,
                side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
                size: None,
            });
            price *= 1.0 + growth_per_tick;
        }
        Self::from_ticks(ticks, DEFAULT_LOG_SCALE)
    }
}

fn round_to_interval(ts: i64, interval: i64) -> i64 {
    ts - ts.rem_euclid(interval)
}
