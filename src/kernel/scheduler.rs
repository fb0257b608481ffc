use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::channel::EdgeCounterChannel;
use super::clock::{Synchronized, WallClock};
use super::event::{ChannelCount, SamplingResult};
use super::telemetry::{NodeEvent, TelemetryRecorder};
use super::time::Tick;
use crate::error::PublishError;
use crate::hal::{CounterEvents, DigitalInput};
use crate::outputs::encoder::{TelemetryEncoder, TelemetryRecord};
use crate::outputs::sink::PublishSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next tick.
    Idle,
    /// Draining channels, encoding, publishing.
    Sampling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerSignal {
    TickDue,
    TickComplete,
}

impl SchedulerState {
    /// (State, Signal) -> next state. None for signals that make no sense in `self`.
    pub fn transition(self, signal: SchedulerSignal) -> Option<SchedulerState> {
        use SchedulerSignal::*;
        use SchedulerState::*;

        match (self, signal) {
            (Idle, TickDue) => Some(Sampling),
            (Sampling, TickComplete) => Some(Idle),
            _ => None,
        }
    }
}

/// Outcome of one tick body.
#[derive(Debug)]
pub struct TickReport {
    pub tick: Tick,
    pub result: SamplingResult,
    pub record: TelemetryRecord,
    pub publish: Result<(), PublishError>,
}

impl TickReport {
    pub fn published(&self) -> bool {
        self.publish.is_ok()
    }
}

pub struct SamplingScheduler<A, S> {
    synchronized: Synchronized,
    channels: Vec<EdgeCounterChannel>,
    period: Duration,
    aux_input: A,
    sink: S,
    topic: String,
    encoder: TelemetryEncoder,
    clock: Arc<dyn WallClock>,
    diagnostics: Option<CounterEvents>,
    dropped_reported: u64,
    pub telemetry: TelemetryRecorder,
    state: SchedulerState,
    tick: Tick,
}

impl<A, S> SamplingScheduler<A, S>
where
    A: DigitalInput + Send,
    S: PublishSink,
{
    /// Building a scheduler requires proof the clock was validated first.
    pub fn new(
        synchronized: Synchronized,
        channels: Vec<EdgeCounterChannel>,
        period: Duration,
        aux_input: A,
        sink: S,
        clock: Arc<dyn WallClock>,
    ) -> Self {
        let telemetry = TelemetryRecorder::new();
        telemetry.record(NodeEvent::ClockSynchronized { epoch: synchronized.at() });
        Self {
            synchronized,
            channels,
            period,
            aux_input,
            sink,
            topic: String::from("meter/pulses"),
            encoder: TelemetryEncoder::default(),
            clock,
            diagnostics: None,
            dropped_reported: 0,
            telemetry,
            state: SchedulerState::Idle,
            tick: Tick::new(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_encoder(mut self, encoder: TelemetryEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Drain unit notifications each tick and log them.
    pub fn with_diagnostics(mut self, events: CounterEvents) -> Self {
        self.diagnostics = Some(events);
        self
    }

    /// Records into a caller-held recorder instead of a private one.
    pub fn with_recorder(mut self, recorder: TelemetryRecorder) -> Self {
        recorder.record(NodeEvent::ClockSynchronized { epoch: self.synchronized.at() });
        self.telemetry = recorder;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Sample forever. The sleep is a fixed period after the previous tick body
    /// finished, so time spent sampling and publishing accumulates as drift.
    pub async fn run(&mut self) {
        info!(
            channels = self.channels.len(),
            period_secs = self.period.as_secs_f64(),
            topic = %self.topic,
            "sampling scheduler active"
        );
        loop {
            tokio::time::sleep(self.period).await;
            self.step().await;
        }
    }

    /// One tick body: read-and-reset every channel in configured order, capture
    /// the tariff input and the time, encode, publish once.
    pub async fn step(&mut self) -> TickReport {
        self.advance(SchedulerSignal::TickDue);
        self.tick = self.tick.next();
        let tick = self.tick;

        // Channel reads first and back to back, so intra-tick skew is a few register reads.
        let counts: Vec<ChannelCount> = self
            .channels
            .iter()
            .map(|channel| {
                let reading = channel.read_and_reset();
                ChannelCount { channel_id: channel.id(), count: reading.count, overflow: reading.overflow }
            })
            .collect();
        let auxiliary_flag = self.aux_input.is_high();
        let timestamp = self.clock.now().timestamp();

        let result = SamplingResult::new(counts, auxiliary_flag, timestamp);
        self.telemetry.record(NodeEvent::TickSampled { tick, timestamp, channels: result.counts().len() });

        for channel in result.overflowed() {
            warn!(
                tick = tick.frame,
                channel = channel.channel_id,
                count = channel.count,
                "channel saturated during interval, count is a lower bound"
            );
            self.telemetry.record(NodeEvent::ChannelOverflow { tick, channel_id: channel.channel_id, count: channel.count });
        }

        self.drain_diagnostics();

        let record = self.encoder.encode(&result);
        debug!(tick = tick.frame, fields = ?record.fields(), "record encoded");

        let publish = match record.to_json() {
            Ok(payload) => self.sink.publish(&self.topic, &payload).await,
            Err(e) => Err(PublishError::Encode(e.to_string())),
        };

        match &publish {
            Ok(()) => {
                debug!(tick = tick.frame, "record published");
                self.telemetry.record(NodeEvent::PublishSucceeded { tick });
            }
            Err(e) => {
                // No retry here; the next tick carries a fresh interval.
                warn!(tick = tick.frame, error = %e, "publish failed, continuing with next tick");
                self.telemetry.record(NodeEvent::PublishFailed { tick, reason: e.to_string() });
            }
        }

        self.advance(SchedulerSignal::TickComplete);

        TickReport { tick, result, record, publish }
    }

    fn advance(&mut self, signal: SchedulerSignal) {
        match self.state.transition(signal) {
            Some(next) => self.state = next,
            None => warn!(state = ?self.state, signal = ?signal, "ignored scheduler signal"),
        }
    }

    fn drain_diagnostics(&mut self) {
        let Some(diagnostics) = self.diagnostics.as_mut() else {
            return;
        };

        for event in diagnostics.drain() {
            debug!(unit = event.unit, kind = ?event.kind, count = event.count, "counter event");
            self.telemetry.record(NodeEvent::CounterDiagnostic { unit: event.unit, kind: event.kind, count: event.count });
        }

        let dropped = diagnostics.dropped();
        if dropped > self.dropped_reported {
            debug!(dropped, "counter event queue overflowed");
            self.dropped_reported = dropped;
            self.telemetry.record(NodeEvent::CounterEventsDropped { total: dropped });
        }
    }
}
