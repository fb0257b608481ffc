use std::future::Future;
use tracing::info;

use crate::error::PublishError;

/// Destination for encoded records. Delivery guarantees, retries and backoff
/// belong to the implementation; callers make one call per record.
pub trait PublishSink: Send {
    fn publish(&mut self, topic: &str, payload: &str) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// Writes every record to the log. Used when no collector is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl PublishSink for LogSink {
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        info!(topic, payload, "telemetry record");
        Ok(())
    }
}
