use chrono::{DateTime, Datelike, Utc};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{info, warn};

/// Source of calendar time.
pub trait WallClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The host's realtime clock (set by SNTP on the device).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Whether the wall clock has been validated. Flips once, never back.
#[derive(Debug, Default)]
pub struct ClockState {
    synchronized_at: OnceLock<i64>,
    transitions: AtomicU32,
}

impl ClockState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized_at.get().is_some()
    }

    /// Epoch seconds observed when the clock was first found valid.
    pub fn synchronized_at(&self) -> Option<i64> {
        self.synchronized_at.get().copied()
    }

    /// Number of unsynchronized -> synchronized transitions. At most 1.
    pub fn transitions(&self) -> u32 {
        self.transitions.load(Ordering::SeqCst)
    }

    /// Returns true only for the call that performed the transition.
    fn mark_synchronized(&self, epoch_secs: i64) -> bool {
        let mut flipped = false;
        self.synchronized_at.get_or_init(|| {
            flipped = true;
            epoch_secs
        });
        if flipped {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }
        flipped
    }
}

/// Proof that the wall clock was validated. Only [`TimeSyncGate`] mints it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Synchronized {
    at: i64,
}

impl Synchronized {
    pub fn at(&self) -> i64 {
        self.at
    }
}

pub struct TimeSyncGate {
    clock: Arc<dyn WallClock>,
    state: Arc<ClockState>,
}

impl TimeSyncGate {
    pub fn new(clock: Arc<dyn WallClock>, state: Arc<ClockState>) -> Self {
        Self { clock, state }
    }

    pub fn state(&self) -> &Arc<ClockState> {
        &self.state
    }

    /// Polls the wall clock until it reports `min_valid_epoch_year` or later.
    ///
    /// There is no timeout: a node whose time source never answers never
    /// samples, because a measurement without a trustworthy timestamp is useless.
    pub async fn wait_until_synchronized(&self, min_valid_epoch_year: i32, poll_interval: Duration) -> Synchronized {
        let mut polls = 0u64;
        loop {
            let now = self.clock.now();
            if now.year() >= min_valid_epoch_year {
                let at = now.timestamp();
                if self.state.mark_synchronized(at) {
                    info!(epoch = at, time = %now.to_rfc3339(), polls, "wall clock synchronized");
                }
                return Synchronized { at };
            }

            polls += 1;
            warn!(year = now.year(), min_valid_epoch_year, "time not set, trying again");
            tokio::time::sleep(poll_interval).await;
        }
    }
}
