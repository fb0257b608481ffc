//! Simulated board peripherals.
//!
//! The counting block mirrors an ESP32 PCNT: 8 independent units that
//! accumulate edges without software involvement. Software only configures a
//! unit and later reads-and-clears it. Edge delivery and read-and-clear are
//! serialized per unit, which is the one guarantee the sampling loop relies on.

pub mod gpio;
pub mod pcnt;
pub mod sim;

pub use gpio::{ControlPolarity, DigitalInput, Gpio, InputPin, Level, GPIO_COUNT};
pub use pcnt::{CounterEvent, CounterEventKind, CounterEvents, CounterUnit, EdgeOutcome, Pcnt, UnitReading, UnitSetup};
pub use sim::PulseTrain;
