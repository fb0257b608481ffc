use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::debug;

use super::pcnt::{EdgeOutcome, UnitCore};
use crate::error::ConfigError;

/// Number of addressable pins on the board (GPIO 0..=39).
pub const GPIO_COUNT: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

/// Which level of a direction-control input counts as "asserted".
/// Asserted control reverses the counting direction of its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPolarity {
    /// Pulled up on the board; grounding the pin reverses the count.
    #[default]
    ActiveLow,
    ActiveHigh,
}

impl ControlPolarity {
    pub fn is_asserted(self, level: Level) -> bool {
        match self {
            ControlPolarity::ActiveLow => level == Level::Low,
            ControlPolarity::ActiveHigh => level == Level::High,
        }
    }

    /// Level the internal pull leaves an unwired pin at: never asserted.
    pub fn idle_level(self) -> Level {
        match self {
            ControlPolarity::ActiveLow => Level::High,
            ControlPolarity::ActiveHigh => Level::Low,
        }
    }
}

/// Read-only capability over a single input level.
pub trait DigitalInput {
    fn level(&self) -> Level;

    fn is_high(&self) -> bool {
        self.level().is_high()
    }
}

/// Route from an edge pin to the counting unit listening on it.
#[derive(Clone)]
pub(crate) struct EdgeRoute {
    pub(crate) unit: Arc<UnitCore>,
    pub(crate) control: Option<(u8, ControlPolarity)>,
}

struct GpioInner {
    levels: Vec<AtomicBool>,
    claims: Mutex<HashMap<u8, String>>,
    routes: Mutex<HashMap<u8, EdgeRoute>>,
}

/// The pin bank. Cheap to clone; all clones observe the same pins.
#[derive(Clone)]
pub struct Gpio {
    inner: Arc<GpioInner>,
}

impl Default for Gpio {
    fn default() -> Self {
        Self::new()
    }
}

impl Gpio {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GpioInner {
                levels: (0..GPIO_COUNT).map(|_| AtomicBool::new(false)).collect(),
                claims: Mutex::new(HashMap::new()),
                routes: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Claims every pin in `pins` for `owner`, or none of them.
    pub fn claim(&self, pins: &[u8], owner: &str) -> Result<(), ConfigError> {
        let mut claims = lock(&self.inner.claims);

        for (i, pin) in pins.iter().enumerate() {
            if *pin >= GPIO_COUNT {
                return Err(ConfigError::PinOutOfRange { pin: *pin, limit: GPIO_COUNT });
            }
            if let Some(existing) = claims.get(pin) {
                return Err(ConfigError::PinInUse { pin: *pin, owner: existing.clone() });
            }
            if pins[..i].contains(pin) {
                return Err(ConfigError::PinConflict { pin: *pin });
            }
        }

        for pin in pins {
            claims.insert(*pin, owner.to_string());
        }
        Ok(())
    }

    pub fn owner(&self, pin: u8) -> Option<String> {
        lock(&self.inner.claims).get(&pin).cloned()
    }

    /// Claims `pin` as a plain digital input.
    pub fn input(&self, pin: u8, owner: &str) -> Result<InputPin, ConfigError> {
        self.claim(&[pin], owner)?;
        Ok(InputPin { gpio: self.clone(), pin })
    }

    pub fn level(&self, pin: u8) -> Level {
        self.inner
            .levels
            .get(pin as usize)
            .map(|l| Level::from(l.load(Ordering::SeqCst)))
            .unwrap_or(Level::Low)
    }

    /// Sets a pin level without edge detection (pull resistors, static wiring).
    pub fn set_level(&self, pin: u8, level: Level) {
        if let Some(l) = self.inner.levels.get(pin as usize) {
            l.store(level.is_high(), Ordering::SeqCst);
        }
    }

    /// Drives a pin. A low-to-high transition is delivered as a rising edge
    /// to whichever counting unit is bound to the pin.
    pub fn drive(&self, pin: u8, level: Level, at: Instant) -> Option<EdgeOutcome> {
        let previous = self.inner.levels.get(pin as usize)?.swap(level.is_high(), Ordering::SeqCst);
        if !previous && level.is_high() {
            Some(self.deliver_edge(pin, at))
        } else {
            None
        }
    }

    /// One complete low-high pulse on `pin`, rising at `at`.
    pub fn pulse(&self, pin: u8, at: Instant) -> EdgeOutcome {
        self.drive(pin, Level::Low, at);
        self.drive(pin, Level::High, at).unwrap_or(EdgeOutcome::Unrouted)
    }

    pub(crate) fn route(&self, edge_pin: u8, route: EdgeRoute) {
        lock(&self.inner.routes).insert(edge_pin, route);
    }

    fn deliver_edge(&self, pin: u8, at: Instant) -> EdgeOutcome {
        // Clone the route out so the unit lock is never taken under the route lock.
        let route = lock(&self.inner.routes).get(&pin).cloned();
        let Some(route) = route else {
            debug!(pin, "rising edge on unrouted pin");
            return EdgeOutcome::Unrouted;
        };

        let reverse = route
            .control
            .map(|(ctrl, polarity)| polarity.is_asserted(self.level(ctrl)))
            .unwrap_or(false);

        route.unit.on_edge(at, reverse)
    }
}

/// A claimed input pin.
#[derive(Clone)]
pub struct InputPin {
    gpio: Gpio,
    pin: u8,
}

impl DigitalInput for InputPin {
    fn level(&self) -> Level {
        self.gpio.level(self.pin)
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding a pin/unit lock leaves plain data behind; keep going.
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
