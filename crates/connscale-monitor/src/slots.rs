//! Live threshold slots.
//!
//! The bounds live in three fixed slots (`0: lower_limit`,
//! `1: upper_limit`, `2: buffer_length`) that an operator may rewrite at any
//! time. Every event reads them fresh, so a rewrite takes effect on the next
//! event without a restart.

use std::sync::atomic::{AtomicU64, Ordering};

use connscale_core::threshold::{BUFFER_LENGTH_SLOT, LOWER_LIMIT_SLOT, UPPER_LIMIT_SLOT};
use connscale_core::{ConfigError, ConfigResult, ThresholdConfig};

const SLOT_COUNT: usize = 3;

/// Marker for a slot that has never been written.
const UNSET: u64 = u64::MAX;

pub struct ThresholdSlots {
    slots: [AtomicU64; SLOT_COUNT],
}

impl ThresholdSlots {
    /// Slots with nothing written. Events are ignored until all three are set.
    pub fn new() -> Self {
        Self {
            slots: [
                AtomicU64::new(UNSET),
                AtomicU64::new(UNSET),
                AtomicU64::new(UNSET),
            ],
        }
    }

    pub fn from_config(config: ThresholdConfig) -> Self {
        let slots = Self::new();
        slots.write_all(config);
        slots
    }

    /// Validate and write all three slots.
    pub fn store(&self, config: ThresholdConfig) -> ConfigResult<()> {
        config.validate()?;
        self.write_all(config);
        Ok(())
    }

    fn write_all(&self, config: ThresholdConfig) {
        self.slots[LOWER_LIMIT_SLOT].store(config.lower_limit as u64, Ordering::Release);
        self.slots[UPPER_LIMIT_SLOT].store(config.upper_limit as u64, Ordering::Release);
        self.slots[BUFFER_LENGTH_SLOT].store(config.buffer_length as u64, Ordering::Release);
    }

    /// Write a single slot.
    ///
    /// Cross-slot consistency is not checked here; `load` refuses an
    /// inconsistent triple instead, so a half-finished rewrite only pauses
    /// evaluation.
    pub fn write_slot(&self, index: usize, value: u32) -> ConfigResult<()> {
        let slot = self.slots.get(index).ok_or(ConfigError::UnknownSlot(index))?;
        slot.store(value as u64, Ordering::Release);
        Ok(())
    }

    /// Raw slot contents, `None` for unwritten slots.
    pub fn raw(&self) -> [Option<u32>; SLOT_COUNT] {
        let read = |i: usize| match self.slots[i].load(Ordering::Acquire) {
            UNSET => None,
            v => Some(v as u32),
        };
        [read(0), read(1), read(2)]
    }

    /// Current bounds, or `None` when any slot is unset or the triple is
    /// inconsistent.
    pub fn load(&self) -> Option<ThresholdConfig> {
        let [lower, upper, buffer] = self.raw();
        let config = ThresholdConfig {
            lower_limit: lower?,
            upper_limit: upper?,
            buffer_length: buffer?,
        };
        config.validate().ok().map(|()| config)
    }
}

impl Default for ThresholdSlots {
    fn default() -> Self {
        Self::new()
    }
}
