//! Mock hardware adapters for integration tests.
//!
//! Every mock shares one [`Timeline`]: a simulated millisecond clock that
//! only advances through [`MockDelay`] (and explicit per-operation costs),
//! plus an ordered log of every hardware call stamped with the time it
//! happened.  Tests assert on the full call history without touching real
//! GPIO, I2C, ADC, or radio registers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use shuntmeter::app::events::CycleEvent;
use shuntmeter::app::ports::{
    BatteryAdc, DeliveryTransport, EventSink, Radio, RadioError, RailPin, SensorBus, ShuntSensor,
    WakeClock,
};
use shuntmeter::config::{Qos, StaticIp};
use shuntmeter::error::{DeliveryError, SensorError};

// ── Call record ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum HwCall {
    RailLevel(bool),
    RailHold(bool),
    SensorOpen,
    SensorCalibrate,
    SensorReady,
    SensorClose,
    SensorRead,
    AdcRead,
    RadioActive(bool),
    RadioBegin,
    MqttConnect,
    MqttPublish { topic: String, payload: String },
}

// ── Timeline ──────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct Timeline {
    now: Rc<Cell<u64>>,
    calls: Rc<RefCell<Vec<(u64, HwCall)>>>,
}

#[allow(dead_code)]
impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now.get()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn record(&self, call: HwCall) {
        self.calls.borrow_mut().push((self.now(), call));
    }

    pub fn calls(&self) -> Vec<HwCall> {
        self.calls.borrow().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn stamped(&self) -> Vec<(u64, HwCall)> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&HwCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|(_, c)| pred(c)).count()
    }

    /// Time of the first call matching `pred`.
    pub fn first_at(&self, pred: impl Fn(&HwCall) -> bool) -> Option<u64> {
        self.calls.borrow().iter().find(|(_, c)| pred(c)).map(|(t, _)| *t)
    }

    /// Index of the last call matching `pred`.
    pub fn last_index(&self, pred: impl Fn(&HwCall) -> bool) -> Option<usize> {
        self.calls.borrow().iter().rposition(|(_, c)| pred(c))
    }

    /// Last rail level written, if any.
    pub fn rail_level(&self) -> Option<bool> {
        self.calls.borrow().iter().rev().find_map(|(_, c)| match c {
            HwCall::RailLevel(high) => Some(*high),
            _ => None,
        })
    }

    pub fn rail_held(&self) -> bool {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find_map(|(_, c)| match c {
                HwCall::RailHold(hold) => Some(*hold),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn published(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|(_, c)| match c {
                HwCall::MqttPublish { payload, .. } => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }
}

// ── Clock and delay ───────────────────────────────────────────

pub struct MockClock(pub Timeline);

impl WakeClock for MockClock {
    fn millis_since_wake(&self) -> u64 {
        self.0.now()
    }
}

pub struct MockDelay(pub Timeline);

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance(u64::from(ns / 1_000_000));
    }
}

// ── Rail ──────────────────────────────────────────────────────

pub struct MockRail(pub Timeline);

impl RailPin for MockRail {
    fn set_high(&mut self, high: bool) {
        self.0.record(HwCall::RailLevel(high));
    }

    fn hold_during_sleep(&mut self, hold: bool) {
        self.0.record(HwCall::RailHold(hold));
    }
}

// ── Sensor ────────────────────────────────────────────────────

/// One raw read: (shunt mV, bus V, current A).
pub type Sample = (f32, f32, f32);

pub struct MockSensor {
    tl: Timeline,
    samples: Vec<Sample>,
    next: usize,
    fail_at: Option<usize>,
}

impl MockSensor {
    fn current(&mut self) -> Result<Sample, SensorError> {
        if self.fail_at == Some(self.next) {
            return Err(SensorError::BusFault);
        }
        Ok(self.samples[self.next % self.samples.len()])
    }
}

impl ShuntSensor for MockSensor {
    fn calibrate(&mut self, _shunt_mohm: u32, _full_scale_drop_mv: f32) -> Result<(), SensorError> {
        self.tl.record(HwCall::SensorCalibrate);
        Ok(())
    }

    fn shunt_voltage_mv(&mut self) -> Result<f32, SensorError> {
        self.tl.record(HwCall::SensorRead);
        Ok(self.current()?.0)
    }

    fn bus_voltage_v(&mut self) -> Result<f32, SensorError> {
        Ok(self.current()?.1)
    }

    fn current_a(&mut self) -> Result<f32, SensorError> {
        let value = self.current()?.2;
        self.next += 1;
        Ok(value)
    }

    fn await_conversion(&mut self, _delay: &mut impl DelayNs) -> Result<(), SensorError> {
        self.tl.record(HwCall::SensorReady);
        Ok(())
    }
}

pub struct MockSensorBus {
    pub tl: Timeline,
    pub present: bool,
    pub samples: Vec<Sample>,
    /// Sample index whose read fails.
    pub fail_at: Option<usize>,
}

#[allow(dead_code)]
impl MockSensorBus {
    pub fn new(tl: &Timeline, samples: &[Sample]) -> Self {
        Self {
            tl: tl.clone(),
            present: true,
            samples: samples.to_vec(),
            fail_at: None,
        }
    }

    pub fn absent(tl: &Timeline) -> Self {
        Self {
            present: false,
            ..Self::new(tl, &[(0.0, 0.0, 0.0)])
        }
    }
}

impl SensorBus for MockSensorBus {
    type Device = MockSensor;

    fn open(&mut self, _address: u8) -> Result<MockSensor, SensorError> {
        self.tl.record(HwCall::SensorOpen);
        if !self.present {
            return Err(SensorError::BusFault);
        }
        Ok(MockSensor {
            tl: self.tl.clone(),
            samples: self.samples.clone(),
            next: 0,
            fail_at: self.fail_at,
        })
    }

    fn close(&mut self, _device: MockSensor) {
        self.tl.record(HwCall::SensorClose);
    }
}

// ── Battery ADC ───────────────────────────────────────────────

pub struct MockAdc {
    pub tl: Timeline,
    pub code: u16,
    pub fails: bool,
}

#[allow(dead_code)]
impl MockAdc {
    pub fn new(tl: &Timeline, code: u16) -> Self {
        Self {
            tl: tl.clone(),
            code,
            fails: false,
        }
    }
}

impl BatteryAdc for MockAdc {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.tl.record(HwCall::AdcRead);
        if self.fails {
            Err(SensorError::AdcReadFailed)
        } else {
            Ok(self.code)
        }
    }
}

// ── Radio ─────────────────────────────────────────────────────

pub struct MockRadio {
    pub tl: Timeline,
    /// Polls before the link reports up (`None` = never).
    pub associate_after_polls: Option<u32>,
    polls: u32,
}

#[allow(dead_code)]
impl MockRadio {
    pub fn new(tl: &Timeline, associate_after_polls: Option<u32>) -> Self {
        Self {
            tl: tl.clone(),
            associate_after_polls,
            polls: 0,
        }
    }
}

impl Radio for MockRadio {
    fn set_active(&mut self, active: bool) {
        self.tl.record(HwCall::RadioActive(active));
    }

    fn apply_static_ip(&mut self, _ip: &StaticIp) -> Result<(), RadioError> {
        Ok(())
    }

    fn begin_connect(&mut self, _ssid: &str, _psk: &str) -> Result<(), RadioError> {
        self.tl.record(HwCall::RadioBegin);
        Ok(())
    }

    fn is_associated(&mut self) -> bool {
        self.polls += 1;
        self.associate_after_polls.is_some_and(|n| self.polls > n)
    }
}

// ── MQTT transport ────────────────────────────────────────────

pub struct MockTransport {
    pub tl: Timeline,
    pub connect_fails: bool,
    pub publish_fails: bool,
    /// Simulated broker round-trip charged to the clock on connect.
    pub connect_cost_ms: u64,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new(tl: &Timeline) -> Self {
        Self {
            tl: tl.clone(),
            connect_fails: false,
            publish_fails: false,
            connect_cost_ms: 0,
        }
    }
}

impl DeliveryTransport for MockTransport {
    fn connect(&mut self, _timeout_ms: u32) -> Result<(), DeliveryError> {
        self.tl.advance(self.connect_cost_ms);
        self.tl.record(HwCall::MqttConnect);
        if self.connect_fails {
            Err(DeliveryError::ConnectFailed)
        } else {
            Ok(())
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8], _qos: Qos) -> Result<(), DeliveryError> {
        if self.publish_fails {
            return Err(DeliveryError::PublishFailed);
        }
        self.tl.record(HwCall::MqttPublish {
            topic: topic.to_owned(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        });
        Ok(())
    }
}

// ── Event recorder ────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<CycleEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aborted(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, CycleEvent::Aborted { .. }))
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &CycleEvent) {
        self.events.push(event.clone());
    }
}
