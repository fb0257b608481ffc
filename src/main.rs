use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pulsenode::config::NodeConfig;
use pulsenode::error::PublishError;
use pulsenode::hal::{Gpio, Pcnt, PulseTrain};
use pulsenode::kernel::clock::{ClockState, SystemClock, WallClock};
use pulsenode::kernel::telemetry::TelemetryRecorder;
use pulsenode::outputs::{LogSink, PublishSink};
use pulsenode::services::collector::CollectorClient;
use pulsenode::{EdgeCounterChannel, SamplingScheduler, TimeSyncGate};

// Chosen at startup from config; the scheduler is generic over one sink type.
enum NodeSink {
    Log(LogSink),
    Collector(CollectorClient),
}

impl PublishSink for NodeSink {
    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), PublishError> {
        match self {
            NodeSink::Log(sink) => sink.publish(topic, payload).await,
            NodeSink::Collector(sink) => sink.publish(topic, payload).await,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    info!("pulsenode starting");

    let config = NodeConfig::load_from_env().context("loading node configuration")?;

    // 2. Counting hardware. Any binding failure aborts startup.
    let gpio = Gpio::new();
    let (pcnt, counter_events) = Pcnt::new(gpio.clone());

    let mut channels = Vec::new();
    for channel_config in config.channel_configs()? {
        let id = channel_config.channel_id;
        let channel = EdgeCounterChannel::configure(&pcnt, channel_config)
            .with_context(|| format!("configuring channel {}", id))?;
        channels.push(channel);
    }
    let tariff = gpio
        .input(config.tariff_pin, "tariff input")
        .context("claiming tariff input")?;

    // 3. Bench pulse sources, if any are wired
    let shutdown = CancellationToken::new();
    let mut simulators = Vec::new();
    for sim in &config.simulators {
        let mut train = PulseTrain::new(gpio.clone(), sim.pin)
            .with_cycle(Duration::from_millis(sim.low_ms), Duration::from_millis(sim.high_ms));
        if let Some(pulses) = sim.pulses {
            train = train.with_limit(pulses);
        }
        simulators.push(tokio::spawn(train.run(shutdown.clone())));
    }

    // 4. Nothing is sampled before the wall clock is trustworthy
    let clock: Arc<dyn WallClock> = Arc::new(SystemClock);
    let gate = TimeSyncGate::new(clock.clone(), Arc::new(ClockState::new()));
    let synchronized = tokio::select! {
        synchronized = gate.wait_until_synchronized(config.min_valid_year, config.sync_poll()) => synchronized,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested before clock sync");
            shutdown.cancel();
            return Ok(());
        }
    };

    // 5. Sink
    let sink = match &config.collector {
        Some(collector) => {
            info!(endpoint = %collector.endpoint, "publishing to collector");
            NodeSink::Collector(
                CollectorClient::new(collector.endpoint.clone(), Duration::from_millis(collector.timeout_ms))
                    .with_retry(collector.max_attempts, Duration::from_millis(collector.backoff_ms)),
            )
        }
        None => {
            info!("no collector configured, records go to the log");
            NodeSink::Log(LogSink)
        }
    };

    // 6. Run until Ctrl-C
    let recorder = TelemetryRecorder::new();
    let mut scheduler = SamplingScheduler::new(synchronized, channels, config.sampling_period(), tariff, sink, clock)
        .with_topic(config.topic.clone())
        .with_encoder(config.encoder())
        .with_diagnostics(counter_events)
        .with_recorder(recorder.clone());

    tokio::select! {
        _ = scheduler.run() => {}
        _ = tokio::signal::ctrl_c() => info!("shutdown requested"),
    }

    shutdown.cancel();
    for handle in simulators {
        if let Err(e) = handle.await {
            warn!(error = %e, "pulse train task failed");
        }
    }

    let summary = recorder.snapshot();
    info!(
        ticks = summary.ticks,
        published = summary.published,
        publish_failures = summary.publish_failures,
        overflows = summary.overflows,
        counter_events = summary.counter_events,
        success_ratio = summary.publish_success_ratio(),
        "session summary"
    );

    Ok(())
}
