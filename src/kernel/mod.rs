//! The sampling pipeline: channels, clock gate, scheduler.

pub mod channel;
pub mod clock;
pub mod event;
pub mod scheduler;
pub mod telemetry;
pub mod time;
