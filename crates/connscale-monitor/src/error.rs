//! Error types for the monitor's control surface.
//!
//! The event path never returns these; it fails open.

use connscale_core::{ConfigError, MonitorKey};
use thiserror::Error;

/// Result type alias for monitor control operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("watch registry is full ({capacity} keys)")]
    CapacityExceeded { capacity: usize },

    #[error("key not registered: {0}")]
    UnknownKey(MonitorKey),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
