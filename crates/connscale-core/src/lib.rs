//! connscale-core: shared types for the connscale workspace.
//!
//! Holds the vocabulary every other crate speaks: monitor keys, TCP state
//! classification, scale directions and signal records, the threshold
//! bounds, and the `connscale.toml` daemon configuration.

pub mod config;
pub mod error;
pub mod threshold;
pub mod types;

pub use config::{ConnscaleConfig, ConsumerConfig, MonitorSettings};
pub use error::{ConfigError, ConfigResult};
pub use threshold::{GatePolicy, ThresholdConfig};
pub use types::*;
