//! Node self-observation.
//!
//! Telemetry here is a read-only side channel: nothing in the sampling path
//! reads it back to make decisions. It records what the node did (ticks,
//! overflows, publish outcomes), never the measured values themselves.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::NodeEvent;
pub use metrics::TelemetrySnapshot;
pub use recorder::TelemetryRecorder;
