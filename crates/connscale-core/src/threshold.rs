//! Threshold bounds and gate policy.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Slot index of `lower_limit` in the threshold slots.
pub const LOWER_LIMIT_SLOT: usize = 0;
/// Slot index of `upper_limit` in the threshold slots.
pub const UPPER_LIMIT_SLOT: usize = 1;
/// Slot index of `buffer_length` in the threshold slots.
pub const BUFFER_LENGTH_SLOT: usize = 2;

/// Global connection-count bounds.
///
/// A key is out of band when its count is `<= lower_limit` or
/// `>= upper_limit`; `buffer_length` consecutive out-of-band events fire a
/// signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub lower_limit: u32,
    pub upper_limit: u32,
    pub buffer_length: u32,
}

impl ThresholdConfig {
    pub fn new(lower_limit: u32, upper_limit: u32, buffer_length: u32) -> ConfigResult<Self> {
        let config = Self {
            lower_limit,
            upper_limit,
            buffer_length,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.upper_limit <= self.lower_limit {
            return Err(ConfigError::InvertedBounds {
                lower: self.lower_limit,
                upper: self.upper_limit,
            });
        }
        if self.buffer_length == 0 {
            return Err(ConfigError::ZeroBufferLength);
        }
        Ok(())
    }

    /// True when `count` sits on or outside either bound.
    pub fn is_out_of_band(&self, count: u32) -> bool {
        count <= self.lower_limit || count >= self.upper_limit
    }
}

/// Whether an emitted signal latches the key's scaling gate.
///
/// `Latched` (the default) suppresses every further evaluation for the key
/// until the gate is cleared externally, so one crossing run yields one
/// signal. `Ungated` keeps evaluating and fires again after every further
/// run of `buffer_length` out-of-band events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePolicy {
    #[default]
    Latched,
    Ungated,
}
