//! connscale.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::threshold::{GatePolicy, ThresholdConfig};
use crate::types::MonitorKey;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnscaleConfig {
    pub thresholds: Option<ThresholdConfig>,
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default)]
    pub gate: GatePolicy,
    /// Upper bound on registered keys before registration is refused.
    #[serde(default = "default_max_keys")]
    pub max_keys: usize,
    /// Output channel slots, one per processing unit.
    #[serde(default = "default_signal_slots")]
    pub signal_slots: usize,
    /// Pending signals each slot buffers before dropping.
    #[serde(default = "default_slot_capacity")]
    pub slot_capacity: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            gate: GatePolicy::default(),
            max_keys: default_max_keys(),
            signal_slots: default_signal_slots(),
            slot_capacity: default_slot_capacity(),
        }
    }
}

fn default_max_keys() -> usize {
    1024
}

fn default_signal_slots() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8)
}

fn default_slot_capacity() -> usize {
    64
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Clear a key's gate this long after its signal was consumed.
    pub rearm_after: Option<String>,
}

impl ConsumerConfig {
    pub fn rearm_after(&self) -> ConfigResult<Option<Duration>> {
        self.rearm_after
            .as_deref()
            .map(parse_duration)
            .transpose()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Keys registered before any traffic is processed.
    #[serde(default)]
    pub keys: Vec<MonitorKey>,
}

impl ConnscaleConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ConnscaleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(thresholds) = &self.thresholds {
            thresholds.validate()?;
        }
        if self.monitor.max_keys == 0 {
            return Err(ConfigError::ZeroSetting("monitor.max_keys"));
        }
        if self.monitor.signal_slots == 0 {
            return Err(ConfigError::ZeroSetting("monitor.signal_slots"));
        }
        if self.monitor.slot_capacity == 0 {
            return Err(ConfigError::ZeroSetting("monitor.slot_capacity"));
        }
        self.consumer.rearm_after()?;
        Ok(())
    }

    /// Starter config with conservative bounds and a 5s re-arm.
    pub fn scaffold() -> Self {
        ConnscaleConfig {
            thresholds: Some(ThresholdConfig {
                lower_limit: 2,
                upper_limit: 10,
                buffer_length: 3,
            }),
            monitor: MonitorSettings::default(),
            consumer: ConsumerConfig {
                rearm_after: Some("5s".to_string()),
            },
            watch: WatchConfig::default(),
        }
    }
}

/// Parse a duration string like "30s", "5m" or a bare number of seconds.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());
    let secs = if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().map_err(|_| invalid())?
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .ok_or_else(invalid)?
    } else {
        s.parse::<u64>().map_err(|_| invalid())?
    };
    Ok(Duration::from_secs(secs))
}
