//! Cycle result payload and the MQTT publisher.
//!
//! Wire format (one JSON object per wake):
//!
//! ```json
//! {"shunt_v":0.001,"bus_v":3.7,"current_A":0.0999,"current_mA":99.9,"power":0.37,
//!  "bat":{"voltage_V":4.01,"percentage":79.0,"critical":false}}
//! ```
//!
//! `bat` is omitted when battery monitoring is disabled or its read failed.

use log::{info, warn};
use serde::Serialize;

use crate::app::ports::DeliveryTransport;
use crate::config::MqttConfig;
use crate::error::DeliveryError;
use crate::sensors::SensorReading;
use crate::sensors::battery::BatteryStatus;

/// Everything one wake cycle reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleResult {
    pub reading: SensorReading,
    pub battery: Option<BatteryStatus>,
}

impl CycleResult {
    pub fn battery_critical(&self) -> bool {
        self.battery.is_some_and(|b| b.critical)
    }

    /// Serialise to the published JSON document.
    pub fn to_json(&self) -> Result<Vec<u8>, DeliveryError> {
        serde_json::to_vec(&WirePayload::from(self)).map_err(|_| DeliveryError::Encode)
    }
}

#[derive(Serialize)]
struct WireBattery {
    #[serde(rename = "voltage_V")]
    voltage_v: f32,
    percentage: f32,
    critical: bool,
}

#[derive(Serialize)]
struct WirePayload {
    shunt_v: f32,
    bus_v: f32,
    #[serde(rename = "current_A")]
    current_a: f32,
    #[serde(rename = "current_mA")]
    current_ma: f32,
    power: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    bat: Option<WireBattery>,
}

impl From<&CycleResult> for WirePayload {
    fn from(r: &CycleResult) -> Self {
        Self {
            shunt_v: r.reading.shunt_v,
            bus_v: r.reading.bus_v,
            current_a: r.reading.current_a,
            current_ma: r.reading.current_ma,
            power: r.reading.power_w,
            bat: r.battery.map(|b| WireBattery {
                voltage_v: b.voltage_v,
                percentage: b.percentage,
                critical: b.critical,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(DeliveryError),
}

/// Single-shot publisher: connect, publish once, no retry.
pub struct Publisher<'a, T: DeliveryTransport> {
    transport: &'a mut T,
    config: &'a MqttConfig,
}

impl<'a, T: DeliveryTransport> Publisher<'a, T> {
    pub fn new(transport: &'a mut T, config: &'a MqttConfig) -> Self {
        Self { transport, config }
    }

    pub fn publish(&mut self, result: &CycleResult) -> DeliveryOutcome {
        match self.try_publish(result) {
            Ok(()) => {
                info!("MQTT: published to '{}'", self.config.topic);
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                warn!("MQTT: {}", e);
                DeliveryOutcome::Failed(e)
            }
        }
    }

    fn try_publish(&mut self, result: &CycleResult) -> Result<(), DeliveryError> {
        let payload = result.to_json()?;
        self.transport.connect(self.config.connect_timeout_ms)?;
        self.transport
            .publish(self.config.topic.as_str(), &payload, self.config.qos)
    }
}
