pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod sim;
pub mod train;

pub use config::AppConfig;
pub use data::{PriceSeries, Side, Tick};
pub use error::{PitError, Result};
pub use metrics::{EpisodeRecord, MemorySink, MetricsSink, TracingSink};
pub use model::{
    HiddenState, LinearGaussianModel, ModelConfig, ParameterSet, PolicyValueModel, Prediction,
    SyncOutcome, TrainBatch,
};
pub use sim::{
    EpisodeSampler, FeatureSpec, FeatureWindow, MarketSimulator, RewardMode, SamplerConfig,
    SimulatorConfig,
};
pub use train::{
    run_validation, Checkpointer, TrainingCheckpoint, TrainingState, ValidationSummary, Worker,
    WorkerCoordinator,
};
