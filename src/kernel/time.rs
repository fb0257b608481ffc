use serde::Serialize;
use std::time::Duration;

/// Sequence number of a sampling tick. Tick 0 is "before the first sample".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Tick {
    pub frame: u64,
}

/// Reference deployment samples once a minute.
pub const DEFAULT_SAMPLING_PERIOD: Duration = Duration::from_secs(60);

/// No deployment predates this year; an earlier wall clock is unset.
pub const DEFAULT_MIN_VALID_YEAR: i32 = 2019;

pub const DEFAULT_SYNC_POLL: Duration = Duration::from_secs(5);

impl Tick {
    pub fn new() -> Self {
        Tick { frame: 0 }
    }

    pub fn next(&self) -> Self {
        Tick { frame: self.frame + 1 }
    }
}
