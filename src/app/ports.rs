//! Port traits: the hexagonal boundary between the wake cycle and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CycleService (domain)
//! ```
//!
//! Driven adapters (rail GPIO, INA226, battery ADC, WiFi, MQTT, deep sleep)
//! implement these traits.  The [`CycleService`](super::service::CycleService)
//! consumes them via generics, so the cycle logic never touches hardware
//! directly and every stage can be exercised with recording test doubles.
//!
//! Timed waits use [`embedded_hal::delay::DelayNs`] rather than a port of
//! our own.

use embedded_hal::delay::DelayNs;

use crate::config::{Qos, StaticIp};
use crate::error::{DeliveryError, SensorError};

// ───────────────────────────────────────────────────────────────
// Sensor rail
// ───────────────────────────────────────────────────────────────

/// GPIO that gates the switched sensor power rail.
pub trait RailPin {
    /// Drive the pin to the given logic level.
    fn set_high(&mut self, high: bool);

    /// Freeze (or release) the current pin level across deep sleep.
    fn hold_during_sleep(&mut self, hold: bool);
}

// ───────────────────────────────────────────────────────────────
// Sensor bus (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// A current/voltage monitor that is open on the bus.
pub trait ShuntSensor {
    /// Program the calibration register for the given shunt.
    fn calibrate(&mut self, shunt_mohm: u32, full_scale_drop_mv: f32) -> Result<(), SensorError>;

    /// Shunt voltage in millivolts.
    fn shunt_voltage_mv(&mut self) -> Result<f32, SensorError>;

    /// Bus voltage in volts.
    fn bus_voltage_v(&mut self) -> Result<f32, SensorError>;

    /// Current in amperes (requires calibration; reads zero otherwise).
    fn current_a(&mut self) -> Result<f32, SensorError>;

    /// Block until the data registers hold a completed conversion.
    ///
    /// Called once after reset and calibration; reads taken before this
    /// returns may still show power-on values.
    fn await_conversion(&mut self, delay: &mut impl DelayNs) -> Result<(), SensorError>;
}

/// Owns the bus peripheral and hands out device handles.
///
/// A device handle exists only between `open` and `close`, which is how the
/// power sequencer guarantees no bus traffic while the rail is down.
pub trait SensorBus {
    type Device: ShuntSensor;

    /// Probe and initialise the device at `address`.
    fn open(&mut self, address: u8) -> Result<Self::Device, SensorError>;

    /// Tear the device down and reclaim the bus.
    fn close(&mut self, device: Self::Device);
}

// ───────────────────────────────────────────────────────────────
// Battery ADC
// ───────────────────────────────────────────────────────────────

pub trait BatteryAdc {
    /// One raw conversion code.
    fn read_raw(&mut self) -> Result<u16, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Radio
// ───────────────────────────────────────────────────────────────

/// Errors surfaced by a [`Radio`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Driver rejected the configuration.
    Config,
    /// Association could not be started.
    Start,
}

impl core::fmt::Display for RadioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Config => write!(f, "radio configuration rejected"),
            Self::Start => write!(f, "radio failed to start association"),
        }
    }
}

/// WiFi station interface.
pub trait Radio {
    fn set_active(&mut self, active: bool);

    /// Replace DHCP with a fixed address.
    fn apply_static_ip(&mut self, ip: &StaticIp) -> Result<(), RadioError>;

    /// Start (non-blocking) association with the access point.
    fn begin_connect(&mut self, ssid: &str, psk: &str) -> Result<(), RadioError>;

    /// True once associated and an address is assigned.
    fn is_associated(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Delivery transport
// ───────────────────────────────────────────────────────────────

/// Broker-facing publish transport.
pub trait DeliveryTransport {
    /// Connect to the broker, giving up after `timeout_ms`.
    fn connect(&mut self, timeout_ms: u32) -> Result<(), DeliveryError>;

    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), DeliveryError>;
}

// ───────────────────────────────────────────────────────────────
// Time and sleep
// ───────────────────────────────────────────────────────────────

/// Monotonic clock that restarts at every wake.
pub trait WakeClock {
    fn millis_since_wake(&self) -> u64;
}

/// What the node does when the wake cycle ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepDirective {
    /// Deep sleep with a timer wake after the given milliseconds.
    Timed(u64),
    /// Deep sleep with no timer wake source.
    Indefinite,
}

/// Deep-sleep primitive.  Entering sleep halts the processor; the next
/// wake restarts the firmware from the top.
pub trait DeepSleepPort {
    fn enter(&mut self, directive: SleepDirective) -> !;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`CycleEvent`](super::events::CycleEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::CycleEvent);
}
