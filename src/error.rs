//! Unified error types for the shuntmeter firmware.
//!
//! A single `Error` enum that every stage of the wake cycle converts into,
//! so the cycle scheduler can make one policy decision per failure
//! (abort-to-sleep vs. continue).  All variants are `Copy` so they can be
//! carried in the cycle report and event stream without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible stage of the wake cycle funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The sensor did not respond after the rail was energised.
    SensorInit(SensorError),
    /// A sensor read failed mid-acquisition.
    Sensor(SensorError),
    /// Acquisition was attempted while the power domain is off.
    NotPowered,
    /// The WiFi link did not associate within the allotted time.
    NetworkTimeout,
    /// The broker connection or publish failed.
    Delivery(DeliveryError),
}

impl Error {
    /// Sensor-side failures are faults.  Network and broker trouble is an
    /// expected part of field life and only worth an informational note.
    pub fn is_fault(&self) -> bool {
        match self {
            Self::SensorInit(_) | Self::Sensor(_) | Self::NotPowered => true,
            Self::NetworkTimeout | Self::Delivery(_) => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorInit(e) => write!(f, "sensor init: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::NotPowered => write!(f, "sensor rail is not powered"),
            Self::NetworkTimeout => write!(f, "network association timed out"),
            Self::Delivery(e) => write!(f, "delivery: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Bus transaction returned an error (NACK, arbitration loss, ...).
    BusFault,
    /// The device answered with an unexpected identity.
    UnexpectedDevice(u16),
    /// The bus peripheral is not available (already claimed by a device).
    BusUnavailable,
    /// Requested calibration cannot be represented in the device register.
    CalibrationOutOfRange,
    /// ADC read returned an error.
    AdcReadFailed,
    /// An acquisition finished without collecting a sample.
    NoData,
    /// The first conversion after reset did not complete in time.
    ConversionTimeout,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFault => write!(f, "I2C bus fault"),
            Self::UnexpectedDevice(id) => write!(f, "unexpected device id 0x{id:04X}"),
            Self::BusUnavailable => write!(f, "I2C bus unavailable"),
            Self::CalibrationOutOfRange => write!(f, "calibration out of range"),
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::NoData => write!(f, "no samples collected"),
            Self::ConversionTimeout => write!(f, "conversion not ready"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Delivery errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// Broker did not accept the connection within the timeout.
    ConnectFailed,
    /// Broker connection was up but the publish was rejected.
    PublishFailed,
    /// Payload could not be serialised.
    Encode,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFailed => write!(f, "MQTT connect failed"),
            Self::PublishFailed => write!(f, "MQTT publish failed"),
            Self::Encode => write!(f, "payload encoding failed"),
        }
    }
}

impl From<DeliveryError> for Error {
    fn from(e: DeliveryError) -> Self {
        Self::Delivery(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
