//! End-to-end wake-cycle tests against mock adapters.

use shuntmeter::app::events::CycleEvent;
use shuntmeter::app::ports::SleepDirective;
use shuntmeter::app::service::{CycleHardware, CycleOutcome, CycleReport, CycleService};
use shuntmeter::config::NodeConfig;
use shuntmeter::error::{DeliveryError, Error, SensorError};
use shuntmeter::fsm::CycleState;
use shuntmeter::power::PowerSequencer;
use shuntmeter::sensors;

use crate::mock_hw::{
    HwCall, MockAdc, MockClock, MockDelay, MockRadio, MockRail, MockSensorBus, MockTransport,
    RecordingSink, Sample, Timeline,
};

type MockHardware = CycleHardware<MockRail, MockSensorBus, MockAdc, MockRadio, MockTransport>;

/// Three reads with a spike in each field; medians are the first row.
const SAMPLES: [Sample; 3] = [(1.0, 4.00, 0.100), (1.2, 4.02, 0.120), (0.9, 3.98, 0.090)];

/// ≈ 4.02 V at the cell with the default divider and reference.
const HEALTHY_CODE: u16 = 2300;
/// ≈ 3.35 V at the cell.
const CRITICAL_CODE: u16 = 1917;

fn hardware(tl: &Timeline, config: &NodeConfig) -> MockHardware {
    CycleHardware::new(
        MockRail(tl.clone()),
        MockSensorBus::new(tl, &SAMPLES),
        MockAdc::new(tl, HEALTHY_CODE),
        MockRadio::new(tl, Some(4)),
        MockTransport::new(tl),
        config,
    )
}

fn run(tl: &Timeline, config: &NodeConfig, hw: &mut MockHardware) -> (CycleReport, RecordingSink) {
    let mut sink = RecordingSink::new();
    let report = CycleService::new(config, MockClock(tl.clone()), MockDelay(tl.clone())).run(hw, &mut sink);
    (report, sink)
}

fn assert_rail_off_and_held(tl: &Timeline) {
    // Default rail switch is active-low: disabled = high.
    assert_eq!(tl.rail_level(), Some(true), "rail left energised");
    assert!(tl.rail_held(), "rail level not held through sleep");
}

fn approx(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

// ── Happy path ────────────────────────────────────────────────

#[test]
fn happy_path_publishes_median_reading() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    let (report, sink) = run(&tl, &config, &mut hw);

    assert_eq!(report.outcome, CycleOutcome::Delivered);
    assert_eq!(
        report.path.as_slice(),
        &[
            CycleState::Init,
            CycleState::RailOn,
            CycleState::Sampling,
            CycleState::RailOff,
            CycleState::NetworkUp,
            CycleState::Publishing,
            CycleState::Sleep,
        ]
    );
    assert_eq!(report.final_state, CycleState::Sleep);

    let reading = report.result.unwrap().reading;
    assert!((reading.shunt_v - 0.001).abs() < 1e-7);
    assert!((reading.bus_v - 4.0).abs() < 1e-6);
    // −10 µA default correction.
    assert!((reading.current_a - 0.099_99).abs() < 1e-7);
    assert!((reading.current_ma - 99.99).abs() < 1e-4);
    assert!((reading.power_w - 0.399_96).abs() < 1e-6);

    let published = tl.published();
    assert_eq!(published.len(), 1);
    let json: serde_json::Value = serde_json::from_str(&published[0]).unwrap();
    assert!(approx(json["shunt_v"].as_f64().unwrap(), 0.001, 1e-6));
    assert!(approx(json["bus_v"].as_f64().unwrap(), 4.0, 1e-6));
    assert!(approx(json["current_A"].as_f64().unwrap(), 0.099_99, 1e-6));
    assert!(approx(json["current_mA"].as_f64().unwrap(), 99.99, 1e-3));
    assert!(approx(json["power"].as_f64().unwrap(), 0.399_96, 1e-5));
    assert!(approx(json["bat"]["voltage_V"].as_f64().unwrap(), 4.019, 1e-3));
    assert!(approx(json["bat"]["percentage"].as_f64().unwrap(), 79.9, 0.1));
    assert_eq!(json["bat"]["critical"], serde_json::Value::Bool(false));

    assert!(matches!(sink.events.first(), Some(CycleEvent::Started)));
    assert!(matches!(sink.events.last(), Some(CycleEvent::Sleeping { .. })));
    assert!(!sink.aborted());
}

#[test]
fn happy_path_hardware_sequence() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    run(&tl, &config, &mut hw);

    let calls = tl.calls();
    assert_eq!(
        &calls[..6],
        &[
            HwCall::RailHold(false),
            HwCall::RailLevel(false),
            HwCall::SensorOpen,
            HwCall::SensorCalibrate,
            HwCall::SensorReady,
            HwCall::SensorRead,
        ]
    );
    assert_eq!(tl.count(|c| *c == HwCall::SensorRead), 3);
    assert_eq!(tl.count(|c| *c == HwCall::SensorOpen), 1);
    assert_eq!(tl.count(|c| *c == HwCall::SensorClose), 1);
    assert_eq!(tl.count(|c| *c == HwCall::AdcRead), 10);

    // Rail is down before the radio comes up, and stays down.
    let rail_off = tl.last_index(|c| *c == HwCall::RailLevel(true)).unwrap();
    let radio_on = tl.last_index(|c| *c == HwCall::RadioActive(true)).unwrap();
    assert!(rail_off < radio_on);
    assert_rail_off_and_held(&tl);

    // Radio off before sleep.
    assert_eq!(calls.last(), Some(&HwCall::RadioActive(false)));
}

#[test]
fn settle_delay_precedes_sensor_open() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    run(&tl, &config, &mut hw);

    let enabled = tl.first_at(|c| *c == HwCall::RailLevel(false)).unwrap();
    let opened = tl.first_at(|c| *c == HwCall::SensorOpen).unwrap();
    assert_eq!(opened - enabled, 100);
}

#[test]
fn sleep_accounts_for_time_awake() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    // 100 settle + 2×10 inter-sample + 10×10 battery + 4×50 polls = 420 ms,
    // plus a slow broker handshake.
    hw.transport.connect_cost_ms = 2_980;
    let (report, sink) = run(&tl, &config, &mut hw);

    assert_eq!(report.elapsed_ms, 3_400);
    assert_eq!(report.directive, SleepDirective::Timed(8_600));
    assert!(sink.events.contains(&CycleEvent::Sleeping {
        directive: SleepDirective::Timed(8_600),
        elapsed_ms: 3_400,
    }));
}

#[test]
fn overrun_sleeps_zero() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    hw.transport.connect_cost_ms = 20_000;
    let (report, _) = run(&tl, &config, &mut hw);
    assert_eq!(report.outcome, CycleOutcome::Delivered);
    assert_eq!(report.directive, SleepDirective::Timed(0));
}

// ── Acquisition ───────────────────────────────────────────────

#[test]
fn acquisition_refused_while_rail_off() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut rail = PowerSequencer::new(MockRail(tl.clone()), MockSensorBus::new(&tl, &SAMPLES), &config);

    let err = sensors::acquire(
        &mut rail,
        &config.sampling,
        &config.sensor.correction,
        &mut MockDelay(tl.clone()),
    )
    .unwrap_err();

    assert_eq!(err, Error::NotPowered);
    assert!(tl.calls().is_empty(), "bus touched while off: {:?}", tl.calls());
    assert_eq!(tl.now(), 0);
}

#[test]
fn single_sample_reads_once_without_waiting() {
    let tl = Timeline::new();
    let mut config = NodeConfig::default();
    config.sampling.samples = 1;
    let mut rail = PowerSequencer::new(MockRail(tl.clone()), MockSensorBus::new(&tl, &SAMPLES), &config);
    rail.power_on(&mut MockDelay(tl.clone())).unwrap();
    let before = tl.now();

    let reading = sensors::acquire(
        &mut rail,
        &config.sampling,
        &config.sensor.correction,
        &mut MockDelay(tl.clone()),
    )
    .unwrap();

    assert_eq!(tl.count(|c| *c == HwCall::SensorRead), 1);
    assert_eq!(tl.now(), before, "inter-sample delay taken for a single read");
    assert!((reading.bus_v - 4.0).abs() < 1e-6);
    assert!((reading.current_a - 0.099_99).abs() < 1e-7);
}

// ── Sensor failures ───────────────────────────────────────────

#[test]
fn missing_sensor_sleeps_without_publishing() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    hw.rail = shuntmeter::power::PowerSequencer::new(
        MockRail(tl.clone()),
        MockSensorBus::absent(&tl),
        &config,
    );
    let (report, sink) = run(&tl, &config, &mut hw);

    assert_eq!(
        report.outcome,
        CycleOutcome::Aborted(Error::SensorInit(SensorError::BusFault))
    );
    assert!(report.result.is_none());
    assert_eq!(
        report.path.as_slice(),
        &[
            CycleState::Init,
            CycleState::RailOn,
            CycleState::RailOff,
            CycleState::Sleep,
        ]
    );
    assert_eq!(tl.count(|c| matches!(c, HwCall::RadioActive(_))), 0);
    assert!(tl.published().is_empty());
    assert_rail_off_and_held(&tl);
    // Only the settle delay elapsed.
    assert_eq!(report.directive, SleepDirective::Timed(11_900));
    assert!(sink.events.contains(&CycleEvent::Aborted {
        state: CycleState::RailOn,
        error: Error::SensorInit(SensorError::BusFault),
    }));
}

#[test]
fn failed_sample_read_aborts_and_powers_down() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    let mut bus = MockSensorBus::new(&tl, &SAMPLES);
    bus.fail_at = Some(1);
    hw.rail = shuntmeter::power::PowerSequencer::new(MockRail(tl.clone()), bus, &config);
    let (report, _) = run(&tl, &config, &mut hw);

    assert_eq!(report.outcome, CycleOutcome::Aborted(Error::Sensor(SensorError::BusFault)));
    assert!(report.result.is_none());
    assert_eq!(
        report.path.as_slice(),
        &[
            CycleState::Init,
            CycleState::RailOn,
            CycleState::Sampling,
            CycleState::RailOff,
            CycleState::Sleep,
        ]
    );
    assert_eq!(tl.count(|c| *c == HwCall::SensorClose), 1);
    assert!(tl.published().is_empty());
    assert_rail_off_and_held(&tl);
}

// ── Network failures ──────────────────────────────────────────

#[test]
fn network_timeout_is_bounded_and_rail_is_off() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    hw.radio = MockRadio::new(&tl, None);
    let (report, sink) = run(&tl, &config, &mut hw);

    assert_eq!(report.outcome, CycleOutcome::Aborted(Error::NetworkTimeout));
    let up = tl.first_at(|c| *c == HwCall::RadioActive(true)).unwrap();
    let down = tl.first_at(|c| *c == HwCall::RadioActive(false)).unwrap();
    let waited = down - up;
    assert!(waited > 12_000 && waited <= 12_050, "waited {waited} ms");

    assert_eq!(tl.count(|c| *c == HwCall::MqttConnect), 0);
    assert_rail_off_and_held(&tl);
    // The reading was taken even though it could not be sent.
    assert!(report.result.is_some());
    assert_eq!(report.directive, SleepDirective::Timed(0));
    assert!(sink.aborted());
}

#[test]
fn network_timeout_uses_retry_sleep_when_configured() {
    let tl = Timeline::new();
    let config = NodeConfig {
        network_retry_sleep_secs: Some(86_400),
        ..NodeConfig::default()
    };
    let mut hw = hardware(&tl, &config);
    hw.radio = MockRadio::new(&tl, None);
    let (report, _) = run(&tl, &config, &mut hw);
    assert_eq!(report.directive, SleepDirective::Timed(86_400_000));
}

#[test]
fn broker_refusal_aborts_after_radio_off() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    hw.transport.connect_fails = true;
    let (report, sink) = run(&tl, &config, &mut hw);

    assert_eq!(
        report.outcome,
        CycleOutcome::Aborted(Error::Delivery(DeliveryError::ConnectFailed))
    );
    assert_eq!(
        &report.path[report.path.len() - 3..],
        &[CycleState::Publishing, CycleState::RailOff, CycleState::Sleep]
    );
    assert_eq!(tl.calls().last(), Some(&HwCall::RadioActive(false)));
    assert_rail_off_and_held(&tl);
    // Delivery failures sleep on the regular schedule.
    assert!(matches!(report.directive, SleepDirective::Timed(ms) if ms > 0 && ms < 12_000));
    assert!(sink.events.iter().any(|e| matches!(e, CycleEvent::Published(_))));
}

#[test]
fn rejected_publish_aborts_with_cause() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    hw.transport.publish_fails = true;
    let (report, sink) = run(&tl, &config, &mut hw);

    assert_eq!(
        report.outcome,
        CycleOutcome::Aborted(Error::Delivery(DeliveryError::PublishFailed))
    );
    assert_eq!(tl.count(|c| *c == HwCall::MqttConnect), 1);
    assert!(tl.published().is_empty());
    assert!(sink.events.contains(&CycleEvent::Published(
        shuntmeter::delivery::DeliveryOutcome::Failed(DeliveryError::PublishFailed)
    )));
    assert_rail_off_and_held(&tl);
}

// ── Battery ───────────────────────────────────────────────────

#[test]
fn disabled_battery_is_omitted_from_payload() {
    let tl = Timeline::new();
    let mut config = NodeConfig::default();
    config.battery.enabled = false;
    let mut hw = hardware(&tl, &config);
    let (report, _) = run(&tl, &config, &mut hw);

    assert_eq!(report.outcome, CycleOutcome::Delivered);
    assert_eq!(tl.count(|c| *c == HwCall::AdcRead), 0);
    let json: serde_json::Value = serde_json::from_str(&tl.published()[0]).unwrap();
    assert!(json.get("bat").is_none());
}

#[test]
fn battery_read_failure_still_delivers() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    let mut adc = MockAdc::new(&tl, HEALTHY_CODE);
    adc.fails = true;
    hw.battery = shuntmeter::sensors::battery::BatteryMonitor::new(adc, &config.battery);
    let (report, _) = run(&tl, &config, &mut hw);

    assert_eq!(report.outcome, CycleOutcome::Delivered);
    assert!(report.result.unwrap().battery.is_none());
    assert!(!tl.published()[0].contains("bat"));
}

#[test]
fn critical_battery_hibernates_when_enabled() {
    let tl = Timeline::new();
    let mut config = NodeConfig::default();
    config.battery.hibernate_when_critical = true;
    let mut hw = hardware(&tl, &config);
    hw.battery = shuntmeter::sensors::battery::BatteryMonitor::new(
        MockAdc::new(&tl, CRITICAL_CODE),
        &config.battery,
    );
    let (report, _) = run(&tl, &config, &mut hw);

    assert_eq!(report.outcome, CycleOutcome::Delivered);
    assert!(report.result.unwrap().battery_critical());
    assert!(tl.published()[0].contains(r#""critical":true"#));
    assert_eq!(report.directive, SleepDirective::Indefinite);
}

#[test]
fn critical_battery_keeps_schedule_by_default() {
    let tl = Timeline::new();
    let config = NodeConfig::default();
    let mut hw = hardware(&tl, &config);
    hw.battery = shuntmeter::sensors::battery::BatteryMonitor::new(
        MockAdc::new(&tl, CRITICAL_CODE),
        &config.battery,
    );
    let (report, _) = run(&tl, &config, &mut hw);
    assert!(matches!(report.directive, SleepDirective::Timed(_)));
}
