use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::gpio::{Gpio, Level};

/// Bench pulse generator: holds a pin low, then high, once per pulse.
/// Wired to a counting input it stands in for a meter's S0 output.
pub struct PulseTrain {
    gpio: Gpio,
    pin: u8,
    low: Duration,
    high: Duration,
    limit: Option<u64>,
}

impl PulseTrain {
    pub fn new(gpio: Gpio, pin: u8) -> Self {
        Self {
            gpio,
            pin,
            low: Duration::from_millis(50),
            high: Duration::from_millis(200),
            limit: None,
        }
    }

    pub fn with_cycle(mut self, low: Duration, high: Duration) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    /// Stop after `pulses` rising edges.
    pub fn with_limit(mut self, pulses: u64) -> Self {
        self.limit = Some(pulses);
        self
    }

    /// Runs until cancelled or the pulse limit is reached. Returns pulses emitted.
    pub async fn run(self, cancel: CancellationToken) -> u64 {
        info!(pin = self.pin, low_ms = self.low.as_millis() as u64, high_ms = self.high.as_millis() as u64, "pulse train started");
        let mut pulses = 0u64;

        loop {
            if self.limit.is_some_and(|limit| pulses >= limit) {
                break;
            }

            self.gpio.drive(self.pin, Level::Low, Instant::now().into_std());
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.low) => {}
            }

            self.gpio.drive(self.pin, Level::High, Instant::now().into_std());
            pulses += 1;
            debug!(pin = self.pin, pulses, "pulse emitted");

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.high) => {}
            }
        }

        info!(pin = self.pin, pulses, "pulse train stopped");
        pulses
    }
}
