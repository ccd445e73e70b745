//! Episode Sampling
//!
//! Partitions the tick series into training starts and reserved holdout
//! starts. Holdout windows are fixed at construction from a seed;
//! training draws reject any start whose widened window could leak into
//! holdout data. Safe to share across workers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PitError, Result};

/// Attempts before a training draw gives up.
const MAX_DRAW_RETRIES: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Number of reserved holdout windows
    pub holdout_count: usize,
    /// Steps per episode
    pub episode_len: usize,
    /// Seed for holdout placement and training draws
    pub seed: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            holdout_count: 100,
            episode_len: 1000,
            seed: 17,
        }
    }
}

/// Hands out episode windows over a series of `series_len` ticks.
#[derive(Debug)]
pub struct EpisodeSampler {
    series_len: usize,
    episode_len: usize,
    holdouts: Vec<usize>,
    rng: Mutex<StdRng>,
    holdout_cursor: AtomicUsize,
}

impl EpisodeSampler {
    /// Reserve holdout windows and prepare the training-draw generator.
    ///
    /// Placement is deterministic for a fixed seed: evenly spaced anchors,
    /// each jittered within its stride so windows never overlap. Fails if
    /// the series cannot host `holdout_count` non-overlapping windows.
    pub fn new(series_len: usize, config: &SamplerConfig) -> Result<Self> {
        let episode_len = config.episode_len;
        if episode_len == 0 || series_len <= episode_len {
            return Err(PitError::EpisodeRange(format!(
                "series of {} ticks cannot host {}-step episodes",
                series_len, episode_len
            )));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut holdouts = Vec::with_capacity(config.holdout_count);
        if config.holdout_count > 0 {
            let stride = (series_len - episode_len) / config.holdout_count;
            if stride < episode_len {
                return Err(PitError::EpisodeRange(format!(
                    "cannot reserve {} non-overlapping {}-step holdout windows in {} ticks",
                    config.holdout_count, episode_len, series_len
                )));
            }
            let slack = stride - episode_len;
            for i in 0..config.holdout_count {
                let jitter = if slack > 0 { rng.gen_range(0..=slack) } else { 0 };
                holdouts.push(i * stride + jitter);
            }
        }

        Ok(Self {
            series_len,
            episode_len,
            holdouts,
            rng: Mutex::new(rng),
            holdout_cursor: AtomicUsize::new(0),
        })
    }

    /// Draw a random training start.
    ///
    /// The candidate's widened window `[start - episode_len,
    /// start + episode_len]` must not intersect any holdout window;
    /// collisions are resampled up to a bounded retry count.
    pub fn next_training_start(&self) -> Result<usize> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| PitError::EpisodeRange("sampler lock poisoned".to_string()))?;
        for _ in 0..MAX_DRAW_RETRIES {
            let candidate = rng.gen_range(0..self.series_len - self.episode_len);
            if !self.collides_with_holdout(candidate) {
                return Ok(candidate);
            }
        }
        Err(PitError::EpisodeRange(format!(
            "no holdout-free training start found in {} attempts",
            MAX_DRAW_RETRIES
        )))
    }

    /// Next holdout start, round-robin over the reserved list.
    ///
    /// Used only by the validation pass; touches no training-side state.
    pub fn next_holdout_start(&self) -> usize {
        let i = self.holdout_cursor.fetch_add(1, Ordering::Relaxed);
        self.holdouts[i % self.holdouts.len()]
    }

    pub fn holdouts(&self) -> &[usize] {
        &self.holdouts
    }

    pub fn holdout_count(&self) -> usize {
        self.holdouts.len()
    }

    pub fn episode_len(&self) -> usize {
        self.episode_len
    }

    /// Whether `[candidate - episode_len, candidate + episode_len]`
    /// intersects any reserved `[h, h + episode_len]` window.
    fn collides_with_holdout(&self, candidate: usize) -> bool {
        let len = self.episode_len;
        self.holdouts
            .iter()
            .any(|&h| candidate <= h + 2 * len && h <= candidate + len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holdouts_in_bounds_and_disjoint() {
        let config = SamplerConfig {
            holdout_count: 10,
            episode_len: 50,
            seed: 3,
        };
        let sampler = EpisodeSampler::new(10_000, &config).unwrap();

        let holdouts = sampler.holdouts();
        assert_eq!(holdouts.len(), 10);
        for window in holdouts.windows(2) {
            assert!(window[0] + 50 <= window[1]);
        }
        for &h in holdouts {
            assert!(h + 50 <= 10_000);
        }
    }

    #[test]
    fn test_holdout_placement_deterministic() {
        let config = SamplerConfig {
            holdout_count: 8,
            episode_len: 100,
            seed: 42,
        };
        let a = EpisodeSampler::new(100_000, &config).unwrap();
        let b = EpisodeSampler::new(100_000, &config).unwrap();
        assert_eq!(a.holdouts(), b.holdouts());
    }

    #[test]
    fn test_rejects_impossible_reservation() {
        let config = SamplerConfig {
            holdout_count: 100,
            episode_len: 100,
            seed: 1,
        };
        let err = EpisodeSampler::new(1_000, &config).unwrap_err();
        assert!(matches!(err, PitError::EpisodeRange(_)));
    }

    #[test]
    fn test_training_starts_avoid_holdouts() {
        let config = SamplerConfig {
            holdout_count: 10,
            episode_len: 100,
            seed: 9,
        };
        let sampler = EpisodeSampler::new(50_000, &config).unwrap();

        for _ in 0..2_000 {
            let start = sampler.next_training_start().unwrap();
            assert!(start + 100 <= 50_000);
            for &h in sampler.holdouts() {
                let disjoint = start + 100 < h || h + 200 < start;
                assert!(disjoint, "start {} leaks into holdout {}", start, h);
            }
        }
    }

    #[test]
    fn test_holdout_round_robin() {
        let config = SamplerConfig {
            holdout_count: 3,
            episode_len: 10,
            seed: 5,
        };
        let sampler = EpisodeSampler::new(1_000, &config).unwrap();
        let expected = sampler.holdouts().to_vec();

        let drawn: Vec<usize> = (0..6).map(|_| sampler.next_holdout_start()).collect();
        assert_eq!(&drawn[..3], &expected[..]);
        assert_eq!(&drawn[3..], &expected[..]);
    }
}
