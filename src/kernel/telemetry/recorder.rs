use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use super::event::NodeEvent;
use super::metrics::{TelemetrySnapshot, compute_snapshot};
use crate::hal::gpio::lock;

const MAX_EVENTS: usize = 10_000;

/// Bounded node event log. Clones share the same buffer, so the caller can
/// keep a handle while the scheduler owns another.
#[derive(Debug, Clone, Default)]
pub struct TelemetryRecorder {
    buffer: Arc<Mutex<VecDeque<NodeEvent>>>,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(1024))),
        }
    }

    pub fn record(&self, event: NodeEvent) {
        let mut buffer = lock(&self.buffer);
        if buffer.len() >= MAX_EVENTS {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        compute_snapshot(&lock(&self.buffer))
    }

    pub fn events(&self) -> Vec<NodeEvent> {
        lock(&self.buffer).iter().cloned().collect()
    }
}
