use pulsenode::error::ConfigError;
use pulsenode::hal::{ControlPolarity, CounterEventKind, EdgeOutcome, Gpio, Level, Pcnt};
use pulsenode::kernel::channel::{ChannelConfig, EdgeCounterChannel};
use std::time::{Duration, Instant};

const SPACING: Duration = Duration::from_millis(1);

// Helper: n evenly spaced pulses on `pin`, returns the instant after the last one.
fn pulse_n(gpio: &Gpio, pin: u8, n: u32, start: Instant) -> Instant {
    for i in 0..n {
        gpio.pulse(pin, start + SPACING * i);
    }
    start + SPACING * n
}

#[test]
fn test_fresh_channel_reads_zero() {
    let (pcnt, _events) = Pcnt::new(Gpio::new());
    let channel = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(1, 16)).expect("configure");

    let reading = channel.read_and_reset();
    assert_eq!(reading.count, 0);
    assert!(!reading.overflow);
}

#[test]
fn test_counts_every_edge_below_bound() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(1, 16)).unwrap();

    pulse_n(&gpio, 16, 1_000, Instant::now());

    let reading = channel.read_and_reset();
    assert_eq!(reading.count, 1_000);
    assert!(!reading.overflow, "1000 edges stay inside the bounds");
}

#[test]
fn test_reaching_bound_exactly_is_not_overflow() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16).with_saturation(-100, 100),
    )
    .unwrap();

    pulse_n(&gpio, 16, 100, Instant::now());

    let reading = channel.read_and_reset();
    assert_eq!(reading.count, 100);
    assert!(!reading.overflow, "no edge was lost at exactly the bound");
}

#[test]
fn test_saturates_at_high_bound_and_flags() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16).with_saturation(-100, 100),
    )
    .unwrap();

    let start = Instant::now();
    pulse_n(&gpio, 16, 100, start);
    assert_eq!(gpio.pulse(16, start + Duration::from_secs(1)), EdgeOutcome::Saturated);
    pulse_n(&gpio, 16, 49, start + Duration::from_secs(2));

    let reading = channel.read_and_reset();
    assert_eq!(reading.count, 100, "count is clamped, not wrapped");
    assert!(reading.overflow);

    // Flag belongs to the interval that saturated, not the next one.
    pulse_n(&gpio, 16, 3, start + Duration::from_secs(3));
    let reading = channel.read_and_reset();
    assert_eq!(reading.count, 3);
    assert!(!reading.overflow);
}

#[test]
fn test_second_read_without_edges_is_zero() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(1, 16)).unwrap();

    pulse_n(&gpio, 16, 42, Instant::now());

    assert_eq!(channel.read_and_reset().count, 42);
    let again = channel.read_and_reset();
    assert_eq!(again.count, 0);
    assert!(!again.overflow);
}

#[test]
fn test_debounce_rejects_edges_inside_window() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16).with_debounce(Duration::from_millis(10)),
    )
    .unwrap();

    let start = Instant::now();
    // 1. A burst of chatter 1ms apart: only the first survives
    assert_eq!(gpio.pulse(16, start), EdgeOutcome::Counted);
    for ms in 1..10 {
        assert_eq!(gpio.pulse(16, start + Duration::from_millis(ms)), EdgeOutcome::Filtered);
    }

    // 2. Window measured from the last accepted edge
    assert_eq!(gpio.pulse(16, start + Duration::from_millis(10)), EdgeOutcome::Counted);

    assert_eq!(channel.read_and_reset().count, 2);

    // 3. A reset does not reopen the window
    assert_eq!(gpio.pulse(16, start + Duration::from_millis(15)), EdgeOutcome::Filtered);
    assert_eq!(channel.read_and_reset().count, 0);
}

#[test]
fn test_zero_debounce_accepts_coincident_edges() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16).with_debounce(Duration::ZERO),
    )
    .unwrap();

    let at = Instant::now();
    for _ in 0..5 {
        gpio.pulse(16, at);
    }
    assert_eq!(channel.read_and_reset().count, 5);
}

#[test]
fn test_direction_input_reverses_count() {
    // Two channels, identical 50-edge input, differing only in control state.
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let forward = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16).with_direction_pin(0, ControlPolarity::ActiveLow),
    )
    .unwrap();
    let reverse = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(2, 17).with_direction_pin(2, ControlPolarity::ActiveLow),
    )
    .unwrap();

    // Pull-up leaves pin 0 high (not asserted); ground pin 2.
    assert_eq!(gpio.level(0), Level::High);
    gpio.set_level(2, Level::Low);

    let start = Instant::now();
    pulse_n(&gpio, 16, 50, start);
    pulse_n(&gpio, 17, 50, start);

    assert_eq!(forward.read_and_reset().count, 50);
    assert_eq!(reverse.read_and_reset().count, -50);
}

#[test]
fn test_active_high_polarity() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16).with_direction_pin(0, ControlPolarity::ActiveHigh),
    )
    .unwrap();

    // Pulled down while unwired: counts up
    let next = pulse_n(&gpio, 16, 7, Instant::now());
    assert_eq!(gpio.level(0), Level::Low);
    assert_eq!(channel.read_and_reset().count, 7);

    // Driving the pin high reverses
    gpio.set_level(0, Level::High);
    pulse_n(&gpio, 16, 7, next);
    assert_eq!(channel.read_and_reset().count, -7);
}

#[test]
fn test_saturates_at_low_bound() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16)
            .with_direction_pin(0, ControlPolarity::ActiveLow)
            .with_saturation(-10, 10),
    )
    .unwrap();
    gpio.set_level(0, Level::Low);

    pulse_n(&gpio, 16, 20, Instant::now());

    let reading = channel.read_and_reset();
    assert_eq!(reading.count, -10);
    assert!(reading.overflow);
}

#[test]
fn test_accumulated_survives_resets() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(1, 16)).unwrap();

    let t = pulse_n(&gpio, 16, 30, Instant::now());
    channel.read_and_reset();
    pulse_n(&gpio, 16, 12, t);
    channel.read_and_reset();

    assert_eq!(channel.accumulated_since_epoch(), 42);
}

#[test]
fn test_no_edge_lost_across_concurrent_resets() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(1, 16)).unwrap();

    const EDGES: u32 = 20_000;
    let start = Instant::now();
    let driver = {
        let gpio = gpio.clone();
        std::thread::spawn(move || {
            for i in 0..EDGES {
                gpio.pulse(16, start + Duration::from_micros(2) * i);
            }
        })
    };

    // Reset hammering while the driver runs
    let mut total: i64 = 0;
    while !driver.is_finished() {
        total += channel.read_and_reset().count as i64;
    }
    driver.join().unwrap();
    total += channel.read_and_reset().count as i64;

    assert_eq!(total, EDGES as i64, "every edge lands in exactly one read");
}

#[test]
fn test_rejects_pin_already_bound() {
    let (pcnt, _events) = Pcnt::new(Gpio::new());
    EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(1, 16)).unwrap();

    let err = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(2, 16)).err().unwrap();
    assert_eq!(err, ConfigError::PinInUse { pin: 16, owner: "channel 1".to_string() });
}

#[test]
fn test_failed_claim_binds_nothing() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16).with_direction_pin(4, ControlPolarity::ActiveLow),
    )
    .unwrap();

    // Edge pin is free but the direction pin is taken
    let err = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(2, 21).with_direction_pin(4, ControlPolarity::ActiveLow),
    );
    assert!(matches!(err, Err(ConfigError::PinInUse { pin: 4, .. })));
    assert_eq!(gpio.owner(21), None, "edge pin must not stay claimed");

    EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(2, 21)).expect("pin 21 still available");
}

#[test]
fn test_rejects_invalid_pins_and_bounds() {
    let (pcnt, _events) = Pcnt::new(Gpio::new());

    let err = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(1, 40)).err().unwrap();
    assert!(matches!(err, ConfigError::PinOutOfRange { pin: 40, .. }));

    let err = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16).with_direction_pin(16, ControlPolarity::ActiveLow),
    )
    .err()
    .unwrap();
    assert_eq!(err, ConfigError::PinConflict { pin: 16 });

    let err = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(1, 16).with_saturation(0, 100))
        .err()
        .unwrap();
    assert_eq!(err, ConfigError::InvalidBounds { low: 0, high: 100 });

    let err = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(1, 16).with_thresholds(vec![1, 2, 3]))
        .err()
        .unwrap();
    assert_eq!(err, ConfigError::TooManyThresholds { count: 3 });
}

#[test]
fn test_runs_out_of_units() {
    let (pcnt, _events) = Pcnt::new(Gpio::new());
    for id in 0..8u8 {
        EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(id, 10 + id)).unwrap();
    }
    let err = EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(9, 30)).err().unwrap();
    assert_eq!(err, ConfigError::NoFreeUnit { units: 8 });
}

#[test]
fn test_limit_and_threshold_events() {
    let gpio = Gpio::new();
    let (pcnt, mut events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16).with_saturation(-10, 10).with_thresholds(vec![5]),
    )
    .unwrap();

    pulse_n(&gpio, 16, 10, Instant::now());

    let kinds: Vec<CounterEventKind> = events.drain().into_iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![CounterEventKind::Threshold { index: 0 }, CounterEventKind::HighLimit]);
    assert_eq!(channel.read_and_reset().count, 10);
    assert!(events.drain().is_empty());
}

#[test]
fn test_event_queue_is_bounded_and_lossy() {
    let gpio = Gpio::new();
    let (pcnt, mut events) = Pcnt::new(gpio.clone());
    let channel = EdgeCounterChannel::configure(
        &pcnt,
        ChannelConfig::new(1, 16)
            .with_direction_pin(0, ControlPolarity::ActiveLow)
            .with_saturation(-1, 1),
    )
    .unwrap();

    // Alternate direction so every edge posts: HighLimit, Zero, HighLimit, Zero...
    let start = Instant::now();
    for i in 0..16u32 {
        gpio.set_level(0, if i % 2 == 0 { Level::High } else { Level::Low });
        gpio.pulse(16, start + SPACING * i);
    }

    assert_eq!(events.drain().len(), 10);
    assert_eq!(events.dropped(), 6);
    // Counting itself is unaffected by the lost notifications
    assert_eq!(channel.read_and_reset().count, 0);
}

#[test]
fn test_edges_on_unbound_pins_are_ignored() {
    let gpio = Gpio::new();
    let (_pcnt, _events) = Pcnt::new(gpio.clone());
    assert_eq!(gpio.pulse(25, Instant::now()), EdgeOutcome::Unrouted);
    assert_eq!(gpio.pulse(200, Instant::now()), EdgeOutcome::Unrouted);
}

#[test]
fn test_channels_are_independent() {
    let gpio = Gpio::new();
    let (pcnt, _events) = Pcnt::new(gpio.clone());
    let channels: Vec<EdgeCounterChannel> = [(1, 16), (2, 17), (3, 18)]
        .into_iter()
        .map(|(id, pin)| EdgeCounterChannel::configure(&pcnt, ChannelConfig::new(id, pin)).unwrap())
        .collect();

    let start = Instant::now();
    pulse_n(&gpio, 16, 3, start);
    pulse_n(&gpio, 18, 9, start);

    let counts: Vec<i16> = channels.iter().map(|c| c.read_and_reset().count).collect();
    assert_eq!(counts, vec![3, 0, 9]);
}
