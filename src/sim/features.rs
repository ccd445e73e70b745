//! Feature Windows
//!
//! Derives the fixed-shape observation vector fed to the policy at each
//! step: scaled log-price changes over a set of lookback offsets,
//! interleaved with the side indicator of the tick at each lookback
//! position. A window is a pure function of (series, cursor) and is never
//! persisted.

use serde::{Deserialize, Serialize};

use crate::data::PriceSeries;

/// Observation vector produced by [`FeatureSpec::window`].
pub type FeatureWindow = Vec<f64>;

/// Lookback layout of the feature window.
///
/// For each offset `d` the window holds the pair
/// `(log_price[cursor] - log_price[cursor - d], side[cursor - d])`.
/// Offsets reaching before the series start are zero-filled — both the
/// price change and the side slot — so "no signal yet" reads as a flat,
/// sideless market rather than an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    offsets: Vec<usize>,
}

impl FeatureSpec {
    pub fn new(offsets: Vec<usize>) -> Self {
        debug_assert!(offsets.iter().all(|&d| d > 0), "zero lookback offset");
        Self { offsets }
    }

    /// Power-of-two lookbacks `2^lo ..= 2^hi`.
    pub fn powers_of_two(lo: u32, hi: u32) -> Self {
        Self::new((lo..=hi).map(|e| 1usize << e).collect())
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Length of the produced window: one change and one side per offset.
    pub fn dim(&self) -> usize {
        self.offsets.len() * 2
    }

    /// Largest configured lookback.
    pub fn max_offset(&self) -> usize {
        self.offsets.iter().copied().max().unwrap_or(0)
    }

    /// Compute the window at `cursor`.
    pub fn window(&self, series: &PriceSeries, cursor: usize) -> FeatureWindow {
        let mut out = Vec::with_capacity(self.dim());
        for &d in &self.offsets {
            if cursor >= d {
                out.push(series.log_price(cursor) - series.log_price(cursor - d));
                out.push(series.side(cursor - d).indicator());
            } else {
                out.push(0.0);
                out.push(0.0);
            }
        }
        debug_assert_eq!(out.len(), self.dim());
        out
    }
}

impl Default for FeatureSpec {
    /// The trained policy's default lookback pattern: 4 to 512 ticks.
    fn default() -> Self {
        Self::powers_of_two(2, 9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PriceSeries, Side, Tick};

    fn series(prices: &[f64]) -> PriceSeries {
        let ticks = prices
            .iter()
            .enumerate()
            .map(|(i, &price)| Tick {
                timestamp: i as i64,
                price,
                side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
                size: None,
            })
            .collect();
        PriceSeries::from_ticks(ticks, 100.0).unwrap()
    }

    #[test]
    fn test_window_dim() {
        let spec = FeatureSpec::default();
        assert_eq!(spec.offsets(), &[4, 8, 16, 32, 64, 128, 256, 512]);
        assert_eq!(spec.dim(), 16);
        assert_eq!(spec.max_offset(), 512);
    }

    #[test]
    fn test_in_range_offset_is_exact_log_change() {
        let prices: Vec<f64> = (1..=32).map(|i| i as f64).collect();
        let s = series(&prices);
        let spec = FeatureSpec::new(vec![4]);

        let window = spec.window(&s, 10);
        let expected = 100.0 * ((11.0f64).ln() - (7.0f64).ln());
        assert!((window[0] - expected).abs() < 1e-9);
        assert_eq!(window[1], s.side(6).indicator());
    }

    #[test]
    fn test_out_of_range_offset_zero_filled() {
        let prices: Vec<f64> = (1..=32).map(|i| i as f64).collect();
        let s = series(&prices);
        let spec = FeatureSpec::new(vec![4, 16]);

        let window = spec.window(&s, 10);
        // offset 4 is in range, offset 16 is not
        assert!(window[0] != 0.0);
        assert_eq!(window[2], 0.0);
        assert_eq!(window[3], 0.0);
    }

    #[test]
    fn test_cursor_zero_all_zero() {
        let prices: Vec<f64> = (1..=8).map(|i| i as f64).collect();
        let s = series(&prices);
        let spec = FeatureSpec::new(vec![1, 2, 4]);

        let window = spec.window(&s, 0);
        assert!(window.iter().all(|&v| v == 0.0));
    }
}
