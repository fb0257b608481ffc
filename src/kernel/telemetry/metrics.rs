use std::collections::{BTreeMap, VecDeque};
use super::event::NodeEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub ticks: u64,
    pub published: u64,
    pub publish_failures: u64,
    pub overflows: u64,
    pub overflow_by_channel: BTreeMap<u8, u64>,
    pub counter_events: u64,
    pub counter_events_dropped: u64,
    pub clock_synchronized_at: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub last_failure: Option<String>,
}

impl TelemetrySnapshot {
    pub fn publish_success_ratio(&self) -> f64 {
        let attempts = self.published + self.publish_failures;
        if attempts == 0 {
            return 0.0;
        }
        self.published as f64 / attempts as f64
    }
}

pub fn compute_snapshot(events: &VecDeque<NodeEvent>) -> TelemetrySnapshot {
    let mut snap = TelemetrySnapshot::default();

    for event in events {
        match event {
            NodeEvent::ClockSynchronized { epoch } => {
                snap.clock_synchronized_at = Some(*epoch);
            }
            NodeEvent::TickSampled { timestamp, .. } => {
                snap.ticks += 1;
                snap.last_timestamp = Some(*timestamp);
            }
            NodeEvent::ChannelOverflow { channel_id, .. } => {
                snap.overflows += 1;
                *snap.overflow_by_channel.entry(*channel_id).or_insert(0) += 1;
            }
            NodeEvent::PublishSucceeded { .. } => snap.published += 1,
            NodeEvent::PublishFailed { reason, .. } => {
                snap.publish_failures += 1;
                snap.last_failure = Some(reason.clone());
            }
            NodeEvent::CounterDiagnostic { .. } => snap.counter_events += 1,
            // Running total, so the latest report wins.
            NodeEvent::CounterEventsDropped { total } => snap.counter_events_dropped = *total,
        }
    }

    snap
}
