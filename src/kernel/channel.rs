use std::time::Duration;

use crate::error::ConfigError;
use crate::hal::{ControlPolarity, CounterUnit, Pcnt, UnitSetup};

/// Glitch filter of the reference build: 85 APB cycles at 80 MHz.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_nanos(1_062);

pub const DEFAULT_SATURATION_HIGH: i16 = 32767;
pub const DEFAULT_SATURATION_LOW: i16 = -32767;

/// Binding of one metered line to the counting hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub channel_id: u8,
    pub edge_pin: u8,
    /// Asserted level reverses the counting direction.
    pub direction_pin: Option<u8>,
    pub control_polarity: ControlPolarity,
    pub debounce_window: Duration,
    pub saturation_high: i16,
    pub saturation_low: i16,
    /// Counts that post a diagnostic event when reached (max 2).
    pub thresholds: Vec<i16>,
}

impl ChannelConfig {
    pub fn new(channel_id: u8, edge_pin: u8) -> Self {
        Self {
            channel_id,
            edge_pin,
            direction_pin: None,
            control_polarity: ControlPolarity::default(),
            debounce_window: DEFAULT_DEBOUNCE,
            saturation_high: DEFAULT_SATURATION_HIGH,
            saturation_low: DEFAULT_SATURATION_LOW,
            thresholds: Vec::new(),
        }
    }

    pub fn with_direction_pin(mut self, pin: u8, polarity: ControlPolarity) -> Self {
        self.direction_pin = Some(pin);
        self.control_polarity = polarity;
        self
    }

    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    pub fn with_saturation(mut self, low: i16, high: i16) -> Self {
        self.saturation_low = low;
        self.saturation_high = high;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Vec<i16>) -> Self {
        self.thresholds = thresholds;
        self
    }

    fn unit_setup(&self) -> UnitSetup {
        UnitSetup {
            edge_pin: self.edge_pin,
            control: self.direction_pin.map(|pin| (pin, self.control_polarity)),
            filter: self.debounce_window,
            high_limit: self.saturation_high,
            low_limit: self.saturation_low,
            thresholds: self.thresholds.clone(),
        }
    }
}

/// Result of [`EdgeCounterChannel::read_and_reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelReading {
    pub count: i16,
    /// The count sat at a saturation bound this interval; the true total is higher in magnitude.
    pub overflow: bool,
}

/// One metered line. Owns its counting unit for the life of the process.
pub struct EdgeCounterChannel {
    config: ChannelConfig,
    unit: CounterUnit,
}

impl EdgeCounterChannel {
    /// Programs a counting unit for `config` and starts it from zero.
    pub fn configure(pcnt: &Pcnt, config: ChannelConfig) -> Result<Self, ConfigError> {
        let owner = format!("channel {}", config.channel_id);
        let unit = pcnt.claim_unit(config.unit_setup(), &owner)?;
        Ok(Self { config, unit })
    }

    pub fn id(&self) -> u8 {
        self.config.channel_id
    }

    pub fn read_and_reset(&self) -> ChannelReading {
        let reading = self.unit.read_and_clear();
        ChannelReading { count: reading.count, overflow: reading.overflowed }
    }

    /// Net edges since startup, across resets. Diagnostics only.
    pub fn accumulated_since_epoch(&self) -> i64 {
        self.unit.accumulated()
    }
}
