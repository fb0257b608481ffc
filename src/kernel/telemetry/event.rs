use serde::Serialize;

use crate::hal::CounterEventKind;
use crate::kernel::time::Tick;

// Node-internal observations only. Measurement values go out through the encoder,
// not through here.

#[derive(Debug, Clone, Serialize)]
pub enum NodeEvent {
    ClockSynchronized {
        epoch: i64,
    },

    TickSampled {
        tick: Tick,
        timestamp: i64,
        channels: usize,
    },

    /// A channel sat at a saturation bound during the interval ending at `tick`.
    ChannelOverflow {
        tick: Tick,
        channel_id: u8,
        count: i16,
    },

    PublishSucceeded {
        tick: Tick,
    },

    PublishFailed {
        tick: Tick,
        reason: String,
    },

    CounterDiagnostic {
        unit: u8,
        kind: CounterEventKind,
        count: i16,
    },

    /// Notifications lost to a full unit event queue, reported as a running total.
    CounterEventsDropped {
        total: u64,
    },
}
