//! Rollout Buffer
//!
//! Per-worker buffer of steps collected between synchronizations with the
//! global parameters. Owned by exactly one worker, drained at every sync.

use crate::model::TrainBatch;
use crate::sim::FeatureWindow;

/// One collected step: the observation fed to the policy, the realized
/// action, the observed reward and the critic's value estimate.
#[derive(Debug, Clone)]
pub struct StepSample {
    pub features: FeatureWindow,
    pub action: f64,
    pub reward: f64,
    pub value: f64,
}

/// Steps collected since the last sync.
#[derive(Debug, Default)]
pub struct RolloutBuffer {
    steps: Vec<StepSample>,
}

impl RolloutBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            steps: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, step: StepSample) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Drain the buffer into a training batch.
    ///
    /// Walks the steps backward computing the discounted return
    /// `R_t = reward_t + gamma * R_{t+1}` seeded with the bootstrap value
    /// (zero at a terminal state, the critic's estimate of the final
    /// observed state otherwise); `advantage_t = R_t - value_t`.
    pub fn drain_batch(&mut self, gamma: f64, bootstrap_value: f64) -> TrainBatch {
        let n = self.steps.len();
        let mut returns = vec![0.0; n];
        let mut running = bootstrap_value;
        for t in (0..n).rev() {
            running = self.steps[t].reward + gamma * running;
            returns[t] = running;
        }

        let mut batch = TrainBatch {
            features: Vec::with_capacity(n),
            actions: Vec::with_capacity(n),
            returns,
            advantages: Vec::with_capacity(n),
        };
        for (t, step) in self.steps.drain(..).enumerate() {
            batch.advantages.push(batch.returns[t] - step.value);
            batch.features.push(step.features);
            batch.actions.push(step.action);
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(reward: f64, value: f64) -> StepSample {
        StepSample {
            features: vec![0.0; 2],
            action: 0.1,
            reward,
            value,
        }
    }

    #[test]
    fn test_discounted_returns_with_bootstrap() {
        let mut buffer = RolloutBuffer::default();
        buffer.push(sample(1.0, 0.0));
        buffer.push(sample(2.0, 0.0));
        buffer.push(sample(3.0, 0.0));

        let batch = buffer.drain_batch(0.5, 4.0);
        // R_2 = 3 + 0.5*4 = 5; R_1 = 2 + 0.5*5 = 4.5; R_0 = 1 + 0.5*4.5 = 3.25
        assert_eq!(batch.returns, vec![3.25, 4.5, 5.0]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_terminal_bootstrap_is_zero() {
        let mut buffer = RolloutBuffer::default();
        buffer.push(sample(1.0, 0.0));
        buffer.push(sample(1.0, 0.0));

        let batch = buffer.drain_batch(1.0, 0.0);
        assert_eq!(batch.returns, vec![2.0, 1.0]);
    }

    #[test]
    fn test_advantage_subtracts_value_estimate() {
        let mut buffer = RolloutBuffer::default();
        buffer.push(sample(1.0, 0.25));
        buffer.push(sample(1.0, 0.5));

        let batch = buffer.drain_batch(0.0, 0.0);
        assert_eq!(batch.returns, vec![1.0, 1.0]);
        assert_eq!(batch.advantages, vec![0.75, 0.5]);
    }
}
