use thiserror::Error;

/// Raised while binding a counting channel (or an auxiliary input) to hardware.
/// Fatal to startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("GPIO {pin} is outside the valid range 0..{limit}")]
    PinOutOfRange { pin: u8, limit: u8 },

    #[error("GPIO {pin} is already bound to {owner}")]
    PinInUse { pin: u8, owner: String },

    #[error("edge and direction input cannot share GPIO {pin}")]
    PinConflict { pin: u8 },

    #[error("saturation bounds must satisfy low < 0 < high (got low={low}, high={high})")]
    InvalidBounds { low: i16, high: i16 },

    #[error("at most 2 watch thresholds per unit (got {count})")]
    TooManyThresholds { count: usize },

    #[error("threshold {value} lies outside the saturation bounds")]
    ThresholdOutOfBounds { value: i16 },

    #[error("channel id {channel_id} is configured twice")]
    DuplicateChannel { channel_id: u8 },

    #[error("all {units} counting units are in use")]
    NoFreeUnit { units: usize },
}

/// Raised per tick by a publish sink. Never fatal to the sampling loop.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("collector rejected record with HTTP {status}")]
    Rejected { status: u16 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("record could not be serialized: {0}")]
    Encode(String),

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}
