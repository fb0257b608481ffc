pub mod encoder;
pub mod sink;

pub use encoder::{FieldNaming, TelemetryEncoder, TelemetryRecord};
pub use sink::{LogSink, PublishSink};
