/// One channel's share of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCount {
    pub channel_id: u8,
    pub count: i16,
    pub overflow: bool,
}

/// Everything captured at a single tick. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingResult {
    counts: Vec<ChannelCount>,
    auxiliary_flag: bool,
    timestamp: i64,
}

impl SamplingResult {
    pub fn new(counts: Vec<ChannelCount>, auxiliary_flag: bool, timestamp: i64) -> Self {
        Self { counts, auxiliary_flag, timestamp }
    }

    /// Per-channel counts in configured order.
    pub fn counts(&self) -> &[ChannelCount] {
        &self.counts
    }

    /// Tariff indicator level at sampling time.
    pub fn auxiliary_flag(&self) -> bool {
        self.auxiliary_flag
    }

    /// Seconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn overflowed(&self) -> impl Iterator<Item = &ChannelCount> {
        self.counts.iter().filter(|c| c.overflow)
    }
}
