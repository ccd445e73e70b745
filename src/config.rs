use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::model::ModelConfig;
use crate::sim::{FeatureSpec, SamplerConfig, SimulatorConfig};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub features: FeatureSpec,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file with `timestamp,price,side[,size]` records
    pub path: String,
    /// Scale applied to log prices
    pub log_scale: f64,
    /// Optional fixed-cadence resampling interval in seconds
    #[serde(default)]
    pub resample_secs: Option<i64>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: "data/ticks.csv".to_string(),
            log_scale: crate::data::DEFAULT_LOG_SCALE,
            resample_secs: None,
        }
    }
}

/// Coordinator/worker configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of parallel workers
    pub workers: usize,
    /// Total episode budget across all workers
    pub max_episodes: u64,
    /// Steps collected between parameter synchronizations
    pub sync_interval: usize,
    /// Discount factor for returns
    pub gamma: f64,
    /// Base seed; each worker derives its own stream from it
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            max_episodes: 10_000,
            sync_interval: 100,
            gamma: 0.99,
            seed: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Directory for parameter snapshots
    pub dir: String,
    /// Episodes between snapshots
    pub interval: u64,
    /// Snapshots retained before the oldest is removed
    pub max_checkpoints: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            dir: "./checkpoints".to_string(),
            interval: 100,
            max_checkpoints: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter, overridable via RUST_LOG
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g. config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("PIT_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (PIT_TRAINING__WORKERS, etc.)
            .add_source(
                Environment::with_prefix("PIT")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Resolve cross-section values: the model's input width always follows
    /// the feature layout, and the sampler hands out windows of the
    /// simulator's episode length.
    pub fn resolved(mut self) -> Self {
        self.model.feature_dim = self.features.dim();
        self.sampler.episode_len = self.simulator.episode_len;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            simulator: SimulatorConfig::default(),
            features: FeatureSpec::default(),
            sampler: SamplerConfig::default(),
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
            checkpoint: CheckpointConfig::default(),
            logging: LoggingConfig::default(),
        }
        .resolved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let config = AppConfig::default();
        assert_eq!(config.model.feature_dim, config.features.dim());
        assert_eq!(config.sampler.episode_len, config.simulator.episode_len);
        assert!(config.training.workers > 0);
    }

    #[test]
    fn test_load_from_missing_dir_uses_defaults() {
        let config = AppConfig::load_from("/nonexistent-config-dir")
            .map(AppConfig::resolved)
            .unwrap();
        assert_eq!(config.training.sync_interval, 100);
    }
}
