//! Policy/Value Model Contract
//!
//! The trainer treats the function approximator as an external
//! collaborator: it maps feature windows and an opaque hidden state to an
//! action distribution and a value estimate, accepts training batches,
//! and hands out parameter snapshots. `apply_gradients` is serialized
//! internally; `pull` observes either a pre- or a fully-post-update
//! snapshot, never a torn one.

pub mod gaussian;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::sim::FeatureWindow;

pub use gaussian::{LinearGaussianModel, ModelConfig};

/// Opaque recurrent state threaded by the caller across the steps of one
/// episode. The training core never branches on its contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HiddenState(Vec<f64>);

impl HiddenState {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }
}

/// One inference result: a Normal action distribution and a value estimate.
#[derive(Debug, Clone, Copy)]
pub struct Prediction {
    pub action_mean: f64,
    pub action_sd: f64,
    pub value: f64,
}

/// Flat snapshot of the global parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub values: Vec<f64>,
}

impl ParameterSet {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One synchronization batch: the rollout with its discounted returns and
/// advantages.
#[derive(Debug, Clone, Default)]
pub struct TrainBatch {
    pub features: Vec<FeatureWindow>,
    pub actions: Vec<f64>,
    pub returns: Vec<f64>,
    pub advantages: Vec<f64>,
}

impl TrainBatch {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Losses reported by one gradient application.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOutcome {
    pub policy_loss: f64,
    pub value_loss: f64,
}

/// Contract between the training core and the function approximator.
pub trait PolicyValueModel: Send + Sync {
    /// Run inference under a pulled parameter snapshot. The returned
    /// hidden state is threaded into the next step's call by the worker.
    fn predict(
        &self,
        params: &ParameterSet,
        window: &FeatureWindow,
        hidden: &HiddenState,
    ) -> (Prediction, HiddenState);

    /// Atomically apply one batch to the global parameters. Serialized
    /// across concurrent callers.
    fn apply_gradients(&self, batch: &TrainBatch) -> Result<SyncOutcome>;

    /// Snapshot the global parameters; safe concurrently with other pulls
    /// and with at most one in-flight `apply_gradients`.
    fn pull(&self) -> Result<ParameterSet>;

    /// Install a restored snapshot as the new global parameters.
    fn restore(&self, params: &ParameterSet) -> Result<()>;
}
