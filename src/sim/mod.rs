//! Market Simulation
//!
//! Deterministic simulation of trading sessions over historical ticks:
//! feature windowing, order execution, and episode sampling.

pub mod features;
pub mod market;
pub mod sampler;

pub use features::{FeatureSpec, FeatureWindow};
pub use market::{MarketSimulator, RewardMode, SimulatorConfig, MARGIN_CALL_FRACTION};
pub use sampler::{EpisodeSampler, SamplerConfig};
