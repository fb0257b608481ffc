use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::error::ConfigError;
use crate::hal::ControlPolarity;
use crate::kernel::channel::{ChannelConfig, DEFAULT_SATURATION_HIGH, DEFAULT_SATURATION_LOW};
use crate::kernel::time::{DEFAULT_MIN_VALID_YEAR, DEFAULT_SAMPLING_PERIOD, DEFAULT_SYNC_POLL};
use crate::outputs::encoder::{FieldNaming, TelemetryEncoder};

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "PULSENODE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ConfigError),

    #[error("sampling_period_secs must be at least 1")]
    ZeroPeriod,

    #[error("sync_poll_secs must be at least 1")]
    ZeroPoll,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub channel_id: u8,
    pub edge_pin: u8,
    pub direction_pin: Option<u8>,
    pub control_polarity: ControlPolarity,
    /// Glitch filter width in nanoseconds.
    pub debounce_ns: u64,
    pub saturation_high: i16,
    pub saturation_low: i16,
    pub thresholds: Vec<i16>,
}

impl Default for LineConfig {
    fn default() -> Self {
        let base = ChannelConfig::new(1, 16);
        Self {
            channel_id: base.channel_id,
            edge_pin: base.edge_pin,
            direction_pin: None,
            control_polarity: base.control_polarity,
            debounce_ns: base.debounce_window.as_nanos() as u64,
            saturation_high: DEFAULT_SATURATION_HIGH,
            saturation_low: DEFAULT_SATURATION_LOW,
            thresholds: Vec::new(),
        }
    }
}

impl LineConfig {
    fn reference(channel_id: u8, edge_pin: u8, direction_pin: u8) -> Self {
        Self {
            channel_id,
            edge_pin,
            direction_pin: Some(direction_pin),
            ..Self::default()
        }
    }

    pub fn to_channel_config(&self) -> ChannelConfig {
        let mut config = ChannelConfig::new(self.channel_id, self.edge_pin)
            .with_debounce(Duration::from_nanos(self.debounce_ns))
            .with_saturation(self.saturation_low, self.saturation_high)
            .with_thresholds(self.thresholds.clone());
        if let Some(pin) = self.direction_pin {
            config = config.with_direction_pin(pin, self.control_polarity);
        }
        config
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            endpoint: String::from("http://localhost:8080"),
            timeout_ms: 5_000,
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

/// Bench pulse source wired to a pin.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PulseTrainConfig {
    pub pin: u8,
    pub low_ms: u64,
    pub high_ms: u64,
    pub pulses: Option<u64>,
}

impl Default for PulseTrainConfig {
    fn default() -> Self {
        Self { pin: 16, low_ms: 50, high_ms: 200, pulses: None }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub lines: Vec<LineConfig>,
    pub tariff_pin: u8,
    pub sampling_period_secs: u64,
    pub min_valid_year: i32,
    pub sync_poll_secs: u64,
    pub topic: String,
    pub field_naming: FieldNaming,
    pub report_overflow: bool,
    pub collector: Option<CollectorConfig>,
    pub simulators: Vec<PulseTrainConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            lines: vec![
                LineConfig::reference(1, 16, 0),
                LineConfig::reference(2, 17, 2),
                LineConfig::reference(3, 18, 4),
            ],
            tariff_pin: 5,
            sampling_period_secs: DEFAULT_SAMPLING_PERIOD.as_secs(),
            min_valid_year: DEFAULT_MIN_VALID_YEAR,
            sync_poll_secs: DEFAULT_SYNC_POLL.as_secs(),
            topic: String::from("meter/pulses"),
            field_naming: FieldNaming::Plain,
            report_overflow: false,
            collector: None,
            simulators: Vec::new(),
        }
    }
}

impl NodeConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigLoadError> {
        let config: NodeConfig = serde_json::from_str(text)?;
        if config.sampling_period_secs == 0 {
            return Err(ConfigLoadError::ZeroPeriod);
        }
        if config.sync_poll_secs == 0 {
            return Err(ConfigLoadError::ZeroPoll);
        }
        config.channel_configs()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// File named by `PULSENODE_CONFIG`, or built-in defaults.
    pub fn load_from_env() -> Result<Self, ConfigLoadError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Channel configs in wire order. Channel ids must be unique, since they key
    /// the record fields.
    pub fn channel_configs(&self) -> Result<Vec<ChannelConfig>, ConfigError> {
        let mut seen = HashSet::new();
        let mut configs = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            if !seen.insert(line.channel_id) {
                return Err(ConfigError::DuplicateChannel { channel_id: line.channel_id });
            }
            if !(line.saturation_low < 0 && 0 < line.saturation_high) {
                return Err(ConfigError::InvalidBounds { low: line.saturation_low, high: line.saturation_high });
            }
            configs.push(line.to_channel_config());
        }
        Ok(configs)
    }

    pub fn sampling_period(&self) -> Duration {
        Duration::from_secs(self.sampling_period_secs)
    }

    pub fn sync_poll(&self) -> Duration {
        Duration::from_secs(self.sync_poll_secs)
    }

    pub fn encoder(&self) -> TelemetryEncoder {
        TelemetryEncoder::new(self.field_naming).with_overflow_fields(self.report_overflow)
    }
}
