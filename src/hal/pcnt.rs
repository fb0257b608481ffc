use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::gpio::{lock, ControlPolarity, EdgeRoute, Gpio};
use crate::error::ConfigError;

pub const PCNT_UNIT_COUNT: usize = 8;

/// Depth of the limit/threshold notification queue.
pub const EVENT_QUEUE_DEPTH: usize = 10;

/// Hardware watch points per unit (thresh0 / thresh1).
pub const MAX_THRESHOLDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CounterEventKind {
    /// Watch threshold `index` was reached.
    Threshold { index: u8 },
    LowLimit,
    HighLimit,
    /// The count passed through zero while counting.
    Zero,
}

/// Notification posted by a unit from its edge path, like an ISR would.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterEvent {
    pub unit: u8,
    pub kind: CounterEventKind,
    pub count: i16,
}

/// What happened to a single delivered edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// Accepted and applied to the count.
    Counted,
    /// Rejected by the glitch filter.
    Filtered,
    /// Accepted but the count is pinned at a limit.
    Saturated,
    /// No unit listens on the pin.
    Unrouted,
}

/// Unit programming, the equivalent of a `pcnt_config_t` plus filter value.
#[derive(Debug, Clone)]
pub struct UnitSetup {
    pub edge_pin: u8,
    pub control: Option<(u8, ControlPolarity)>,
    pub filter: Duration,
    pub high_limit: i16,
    pub low_limit: i16,
    pub thresholds: Vec<i16>,
}

/// Count captured by a read-and-clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitReading {
    pub count: i16,
    /// An edge arrived while the count was pinned at a limit.
    pub overflowed: bool,
}

struct UnitRegs {
    count: i16,
    overflowed: bool,
    last_accepted: Option<Instant>,
    accumulated: i64,
}

/// Shared between the edge path (via the pin route) and the owning [`CounterUnit`].
pub(crate) struct UnitCore {
    index: u8,
    filter: Duration,
    high_limit: i16,
    low_limit: i16,
    thresholds: Vec<i16>,
    regs: Mutex<UnitRegs>,
    events: Arc<EventQueue>,
}

impl UnitCore {
    pub(crate) fn on_edge(&self, at: Instant, reverse: bool) -> EdgeOutcome {
        let mut regs = lock(&self.regs);

        // Glitch filter sits on the raw input, ahead of the counter and independent of clears.
        if let Some(previous) = regs.last_accepted {
            if at.saturating_duration_since(previous) < self.filter {
                return EdgeOutcome::Filtered;
            }
        }
        regs.last_accepted = Some(at);

        let step: i32 = if reverse { -1 } else { 1 };
        let next = regs.count as i32 + step;
        if next > self.high_limit as i32 || next < self.low_limit as i32 {
            regs.overflowed = true;
            return EdgeOutcome::Saturated;
        }

        regs.count = next as i16;
        regs.accumulated += step as i64;

        let count = regs.count;
        if count == self.high_limit {
            self.post(CounterEventKind::HighLimit, count);
        } else if count == self.low_limit {
            self.post(CounterEventKind::LowLimit, count);
        }
        if let Some(index) = self.thresholds.iter().position(|t| *t == count) {
            self.post(CounterEventKind::Threshold { index: index as u8 }, count);
        }
        if count == 0 {
            self.post(CounterEventKind::Zero, count);
        }

        EdgeOutcome::Counted
    }

    fn post(&self, kind: CounterEventKind, count: i16) {
        self.events.post(CounterEvent { unit: self.index, kind, count });
    }
}

struct EventQueue {
    producer: Mutex<HeapProd<CounterEvent>>,
    dropped: AtomicU64,
}

impl EventQueue {
    fn post(&self, event: CounterEvent) {
        if lock(&self.producer).try_push(event).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Consumer end of the unit notification queue.
///
/// Lossy: when the queue is full new events are dropped and counted. Nothing
/// about count correctness depends on draining it.
pub struct CounterEvents {
    consumer: HeapCons<CounterEvent>,
    queue: Arc<EventQueue>,
}

impl CounterEvents {
    pub fn drain(&mut self) -> Vec<CounterEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.consumer.try_pop() {
            events.push(event);
        }
        events
    }

    /// Events lost to a full queue since startup.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

/// The pulse-counting peripheral.
pub struct Pcnt {
    gpio: Gpio,
    in_use: Mutex<[bool; PCNT_UNIT_COUNT]>,
    events: Arc<EventQueue>,
}

impl Pcnt {
    /// Brings up the peripheral and hands back the notification consumer.
    pub fn new(gpio: Gpio) -> (Self, CounterEvents) {
        let (producer, consumer) = HeapRb::<CounterEvent>::new(EVENT_QUEUE_DEPTH).split();
        let events = Arc::new(EventQueue {
            producer: Mutex::new(producer),
            dropped: AtomicU64::new(0),
        });

        let pcnt = Self {
            gpio,
            in_use: Mutex::new([false; PCNT_UNIT_COUNT]),
            events: events.clone(),
        };
        (pcnt, CounterEvents { consumer, queue: events })
    }

    /// Programs a free unit and starts it counting from zero.
    pub fn claim_unit(&self, setup: UnitSetup, owner: &str) -> Result<CounterUnit, ConfigError> {
        if !(setup.low_limit < 0 && 0 < setup.high_limit) {
            return Err(ConfigError::InvalidBounds { low: setup.low_limit, high: setup.high_limit });
        }
        if setup.thresholds.len() > MAX_THRESHOLDS {
            return Err(ConfigError::TooManyThresholds { count: setup.thresholds.len() });
        }
        if let Some(t) = setup
            .thresholds
            .iter()
            .find(|t| **t < setup.low_limit || **t > setup.high_limit)
        {
            return Err(ConfigError::ThresholdOutOfBounds { value: *t });
        }

        let mut in_use = lock(&self.in_use);
        let index = in_use
            .iter()
            .position(|used| !used)
            .ok_or(ConfigError::NoFreeUnit { units: PCNT_UNIT_COUNT })?;

        let mut pins = vec![setup.edge_pin];
        if let Some((ctrl, _)) = setup.control {
            pins.push(ctrl);
        }
        self.gpio.claim(&pins, owner)?;
        in_use[index] = true;

        if let Some((ctrl, polarity)) = setup.control {
            // Pull toward the idle level so a floating control pin counts up.
            self.gpio.set_level(ctrl, polarity.idle_level());
        }

        let core = Arc::new(UnitCore {
            index: index as u8,
            filter: setup.filter,
            high_limit: setup.high_limit,
            low_limit: setup.low_limit,
            thresholds: setup.thresholds.clone(),
            regs: Mutex::new(UnitRegs {
                count: 0,
                overflowed: false,
                last_accepted: None,
                accumulated: 0,
            }),
            events: self.events.clone(),
        });

        self.gpio.route(setup.edge_pin, EdgeRoute { unit: core.clone(), control: setup.control });

        info!(
            unit = index,
            edge_pin = setup.edge_pin,
            control = ?setup.control,
            filter_ns = setup.filter.as_nanos() as u64,
            "counting unit armed"
        );

        Ok(CounterUnit { core })
    }
}

/// Exclusive handle to one programmed counting unit.
pub struct CounterUnit {
    core: Arc<UnitCore>,
}

impl CounterUnit {
    /// Captures the count and clears it under the unit lock, so an edge lands
    /// either before the capture or after the clear, never in between.
    pub fn read_and_clear(&self) -> UnitReading {
        let mut regs = lock(&self.core.regs);
        let reading = UnitReading { count: regs.count, overflowed: regs.overflowed };
        regs.count = 0;
        regs.overflowed = false;
        debug!(unit = self.core.index, count = reading.count, overflowed = reading.overflowed, "unit cleared");
        reading
    }

    /// Net edges counted since the unit was armed. Ignores clears; excludes
    /// edges lost to saturation.
    pub fn accumulated(&self) -> i64 {
        lock(&self.core.regs).accumulated
    }
}
