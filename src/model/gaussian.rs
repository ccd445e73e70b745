//! Linear Gaussian Actor-Critic
//!
//! Default [`PolicyValueModel`] implementation: a linear actor with tanh
//! mean and softplus deviation heads, a linear critic, and plain SGD over
//! an entropy-regularized policy-gradient objective. Pure Rust over flat
//! `Vec<f64>` parameters; the single internal lock serializes gradient
//! application and gives pulls snapshot-or-nothing visibility.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::error::{PitError, Result};
use crate::model::{HiddenState, ParameterSet, PolicyValueModel, Prediction, SyncOutcome, TrainBatch};
use crate::sim::FeatureWindow;

/// Floor added to the deviation head so sampling never degenerates.
const SD_FLOOR: f64 = 1e-4;

/// Upper cap on the action deviation.
const SD_CAP: f64 = 1.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Input feature dimension
    pub feature_dim: usize,
    /// Learning rate for the actor heads
    pub actor_lr: f64,
    /// Learning rate for the critic head
    pub critic_lr: f64,
    /// Entropy bonus coefficient
    pub entropy_beta: f64,
    /// Scale of the tanh mean head
    pub action_bound: f64,
    /// Std-dev of the weight initialization
    pub init_scale: f64,
    /// Initialization seed
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            feature_dim: 16,
            actor_lr: 1e-4,
            critic_lr: 1e-3,
            entropy_beta: 0.01,
            action_bound: 0.9,
            init_scale: 0.1,
            seed: 23,
        }
    }
}

/// Shared actor-critic with Normal action head.
pub struct LinearGaussianModel {
    config: ModelConfig,
    params: Mutex<ParameterSet>,
}

/// Forward-pass intermediates needed by both inference and the backward
/// pass.
struct Heads {
    mu: f64,
    sd: f64,
    z_sd: f64,
    sd_capped: bool,
    value: f64,
}

impl LinearGaussianModel {
    pub fn new(config: ModelConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);

        let dim = config.feature_dim;
        let mut values = vec![0.0; Self::param_len(dim)];
        // weights drawn from a scaled normal, biases left at zero
        for head in 0..3 {
            let base = head * (dim + 1);
            for w in &mut values[base..base + dim] {
                let sample: f64 = StandardNormal.sample(&mut rng);
                *w = sample * config.init_scale;
            }
        }

        Self {
            config,
            params: Mutex::new(ParameterSet { values }),
        }
    }

    /// Three heads of `dim` weights plus a bias each.
    pub fn param_len(dim: usize) -> usize {
        3 * (dim + 1)
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn forward(&self, p: &[f64], x: &[f64]) -> Heads {
        let dim = self.config.feature_dim;
        debug_assert_eq!(x.len(), dim, "feature window width mismatch");
        let z_mu = dot(&p[0..dim], x) + p[dim];
        let z_sd = dot(&p[dim + 1..2 * dim + 1], x) + p[2 * dim + 1];
        let value = dot(&p[2 * dim + 2..3 * dim + 2], x) + p[3 * dim + 2];

        let mu = self.config.action_bound * z_mu.tanh();
        let raw_sd = softplus(z_sd) + SD_FLOOR;
        let sd_capped = raw_sd > SD_CAP;
        let sd = if sd_capped { SD_CAP } else { raw_sd };

        Heads {
            mu,
            sd,
            z_sd,
            sd_capped,
            value,
        }
    }

    fn check_window(&self, window: &[f64]) -> Result<()> {
        if window.len() != self.config.feature_dim {
            return Err(PitError::Sync(format!(
                "feature window of {} values, model expects {}",
                window.len(),
                self.config.feature_dim
            )));
        }
        Ok(())
    }
}

impl PolicyValueModel for LinearGaussianModel {
    fn predict(
        &self,
        params: &ParameterSet,
        window: &FeatureWindow,
        hidden: &HiddenState,
    ) -> (Prediction, HiddenState) {
        let heads = self.forward(&params.values, window);
        let prediction = Prediction {
            action_mean: heads.mu,
            action_sd: heads.sd,
            value: heads.value,
        };
        // a linear model carries no recurrence; the state passes through
        (prediction, hidden.clone())
    }

    fn apply_gradients(&self, batch: &TrainBatch) -> Result<SyncOutcome> {
        if batch.is_empty() {
            return Ok(SyncOutcome::default());
        }
        for window in &batch.features {
            self.check_window(window)?;
        }

        let mut params = self
            .params
            .lock()
            .map_err(|_| PitError::Sync("parameter lock poisoned".to_string()))?;

        let dim = self.config.feature_dim;
        let n = batch.len() as f64;
        let mut grad = vec![0.0; params.values.len()];
        let mut policy_loss = 0.0;
        let mut value_loss = 0.0;

        for i in 0..batch.len() {
            let x = &batch.features[i];
            let action = batch.actions[i];
            let ret = batch.returns[i];
            let adv = batch.advantages[i];

            let heads = self.forward(&params.values, x);
            let td = ret - heads.value;
            let diff = action - heads.mu;
            let var = heads.sd * heads.sd;

            // ascent directions of logp * advantage + beta * entropy
            let d_mu = adv * diff / var;
            let d_sd = adv * (diff * diff - var) / (var * heads.sd)
                + self.config.entropy_beta / heads.sd;

            let t = heads.mu / self.config.action_bound;
            let dmu_dz = self.config.action_bound * (1.0 - t * t);
            let dsd_dz = if heads.sd_capped {
                0.0
            } else {
                sigmoid(heads.z_sd)
            };

            let g_mu = self.config.actor_lr * d_mu * dmu_dz;
            let g_sd = self.config.actor_lr * d_sd * dsd_dz;
            let g_v = self.config.critic_lr * 2.0 * td;

            for (j, &xj) in x.iter().enumerate() {
                grad[j] += g_mu * xj;
                grad[dim + 1 + j] += g_sd * xj;
                grad[2 * dim + 2 + j] += g_v * xj;
            }
            grad[dim] += g_mu;
            grad[2 * dim + 1] += g_sd;
            grad[3 * dim + 2] += g_v;

            let log_prob =
                -0.5 * (2.0 * std::f64::consts::PI).ln() - heads.sd.ln() - 0.5 * diff * diff / var;
            let entropy = 0.5 * ((2.0 * std::f64::consts::PI).ln() + 1.0) + heads.sd.ln();
            policy_loss -= log_prob * adv + self.config.entropy_beta * entropy;
            value_loss += td * td;
        }

        for (p, g) in params.values.iter_mut().zip(&grad) {
            *p += g / n;
        }

        Ok(SyncOutcome {
            policy_loss: policy_loss / n,
            value_loss: value_loss / n,
        })
    }

    fn pull(&self) -> Result<ParameterSet> {
        self.params
            .lock()
            .map(|p| p.clone())
            .map_err(|_| PitError::Sync("parameter lock poisoned".to_string()))
    }

    fn restore(&self, snapshot: &ParameterSet) -> Result<()> {
        let expected = Self::param_len(self.config.feature_dim);
        if snapshot.len() != expected {
            return Err(PitError::Sync(format!(
                "snapshot of {} parameters, model expects {}",
                snapshot.len(),
                expected
            )));
        }
        let mut params = self
            .params
            .lock()
            .map_err(|_| PitError::Sync("parameter lock poisoned".to_string()))?;
        *params = snapshot.clone();
        Ok(())
    }
}

fn dot(w: &[f64], x: &[f64]) -> f64 {
    w.iter().zip(x).map(|(a, b)| a * b).sum()
}

fn softplus(z: f64) -> f64 {
    if z > 30.0 {
        z
    } else {
        z.exp().ln_1p()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
