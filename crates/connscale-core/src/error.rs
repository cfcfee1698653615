//! Error types for configuration and key parsing.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised on the control surface: parsing keys, validating bounds,
/// writing threshold slots.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid monitor key: {0}")]
    InvalidKey(String),

    #[error("upper limit {upper} must be greater than lower limit {lower}")]
    InvertedBounds { lower: u32, upper: u32 },

    #[error("buffer length must be at least 1")]
    ZeroBufferLength,

    #[error("unknown threshold slot {0} (expected 0, 1 or 2)")]
    UnknownSlot(usize),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("{0} must be greater than zero")]
    ZeroSetting(&'static str),
}
