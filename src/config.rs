//! Node configuration parameters
//!
//! All tunable parameters for one wake cycle.  The configuration is loaded
//! once at wake and never mutated afterwards; the defaults reproduce the
//! field deployment (INA226 on GPIO21/22, AO3401 rail switch on GPIO25,
//! 12 s reporting interval).  A JSON override can replace any subset of
//! fields via [`NodeConfig::from_json`].

use core::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::pins;

/// Upper bound on samples per acquisition (sizes the stack-allocated sample set).
pub const MAX_SAMPLES: usize = 32;

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

/// Errors from loading or validating a [`NodeConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Override document could not be parsed.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Leaf types
// ───────────────────────────────────────────────────────────────

/// Logic level that switches the sensor rail on.
///
/// The AO3401 is a P-channel MOSFET on the high side, so the gate is
/// pulled low to energise the rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    High,
    Low,
}

impl Level {
    pub fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

/// MQTT delivery guarantee requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

/// Correction applied to the aggregated current.
///
/// Both models have been used on deployed nodes, so the choice is left to
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum CurrentCorrection {
    /// Fixed offset in microamperes added to the measured current.
    MicroampOffset { microamps: i32 },
    /// `current * gain + offset_a`.
    Linear { gain: f32, offset_a: f32 },
}

impl CurrentCorrection {
    /// Apply the correction to a current in amperes.
    pub fn apply(&self, current_a: f32) -> f32 {
        match *self {
            Self::MicroampOffset { microamps } => current_a + microamps as f32 / 1_000_000.0,
            Self::Linear { gain, offset_a } => current_a * gain + offset_a,
        }
    }
}

/// Static IPv4 configuration.  Absent = DHCP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIp {
    pub addr: [u8; 4],
    pub mask: [u8; 4],
    pub gateway: [u8; 4],
    pub dns: [u8; 4],
}

impl StaticIp {
    /// Prefix length of the netmask (number of leading one bits).
    pub fn prefix_len(&self) -> u8 {
        u32::from_be_bytes(self.mask).leading_ones() as u8
    }
}

// ───────────────────────────────────────────────────────────────
// Sections
// ───────────────────────────────────────────────────────────────

/// INA226 bus and calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub sda_pin: i32,
    pub scl_pin: i32,
    pub i2c_freq_hz: u32,
    /// 7-bit I2C address.
    pub address: u8,
    /// Shunt resistance in milliohm (10.05 Ω → 10050).
    pub shunt_mohm: u32,
    /// Shunt voltage drop at full-scale current, in millivolts.
    pub full_scale_drop_mv: f32,
    pub correction: CurrentCorrection,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sda_pin: pins::I2C_SDA_GPIO,
            scl_pin: pins::I2C_SCL_GPIO,
            i2c_freq_hz: 100_000,
            address: 0x40,
            shunt_mohm: 10_050,
            full_scale_drop_mv: 81.92,
            correction: CurrentCorrection::MicroampOffset { microamps: -10 },
        }
    }
}

/// Switched sensor power rail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RailConfig {
    pub pin: i32,
    pub enable_level: Level,
    /// Delay after energising the rail before the sensor answers on the bus.
    pub settle_ms: u32,
}

impl Default for RailConfig {
    fn default() -> Self {
        Self {
            pin: pins::SENSOR_RAIL_GPIO,
            enable_level: Level::Low,
            settle_ms: 100,
        }
    }
}

/// Multi-sample acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Samples per acquisition (1..=[`MAX_SAMPLES`]).
    pub samples: u8,
    pub inter_sample_ms: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: 3,
            inter_sample_ms: 10,
        }
    }
}

/// ADC battery monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    pub enabled: bool,
    pub adc_pin: i32,
    /// Raw codes averaged per read.
    pub mean_count: u16,
    /// Fraction (0..=1) at or below which the battery is critical.
    pub critical_threshold: f32,
    pub empty_v: f32,
    pub full_v: f32,
    /// ADC full-scale reference voltage (eFuse / bench calibrated).
    pub vref: f32,
    pub adc_bits: u8,
    /// Battery-to-pin divider ratio (1 MΩ + 1 MΩ → 2.0).
    pub divider_ratio: f32,
    /// Sleep indefinitely after reporting a critical battery.
    pub hibernate_when_critical: bool,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            adc_pin: pins::BATTERY_SENSE_GPIO,
            mean_count: 10,
            critical_threshold: 0.1,
            empty_v: 3.3,
            full_v: 4.2,
            vref: 3.578,
            adc_bits: 12,
            divider_ratio: 2.0,
            hibernate_when_critical: false,
        }
    }
}

/// WiFi station credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub ssid: heapless::String<32>,
    pub psk: heapless::String<64>,
    pub static_ip: Option<StaticIp>,
    /// Upper bound on the association wait.
    pub connect_timeout_ms: u32,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: truncated("shuntmeter"),
            psk: truncated("change-me-please"),
            static_ip: None,
            connect_timeout_ms: 12_000,
        }
    }
}

/// MQTT broker and topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Empty = derive from the factory MAC.
    pub client_id: heapless::String<32>,
    pub host: heapless::String<64>,
    pub port: u16,
    pub user: heapless::String<32>,
    pub password: heapless::String<64>,
    pub topic: heapless::String<64>,
    pub qos: Qos,
    pub connect_timeout_ms: u32,
    pub keepalive_secs: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            client_id: heapless::String::new(),
            host: truncated("192.168.178.28"),
            port: 1883,
            user: truncated("user1"),
            password: heapless::String::new(),
            topic: truncated("ct/current"),
            qos: Qos::AtLeastOnce,
            connect_timeout_ms: 4_000,
            keepalive_secs: 60,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// NodeConfig
// ───────────────────────────────────────────────────────────────

/// Complete per-cycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub sensor: SensorConfig,
    pub rail: RailConfig,
    pub sampling: SamplingConfig,
    pub battery: BatteryConfig,
    pub wifi: WifiConfig,
    pub mqtt: MqttConfig,
    /// Target wake-to-wake period.
    pub interval_secs: u32,
    /// Sleep after a WiFi timeout.  `None` = the regular interval.
    pub network_retry_sleep_secs: Option<u32>,
}

impl NodeConfig {
    /// Parse an override document.  Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply an optional override document, falling back to the defaults
    /// (with a warning) when it is malformed or out of range.
    pub fn from_override(json: Option<&str>) -> Self {
        let Some(json) = json else {
            return Self::default();
        };
        match Self::from_json(json) {
            Ok(config) => {
                info!("Config: override applied");
                config
            }
            Err(e) => {
                warn!("Config: override ignored ({}), using defaults", e);
                Self::default()
            }
        }
    }

    pub fn interval_ms(&self) -> u64 {
        u64::from(self.interval_secs) * 1000
    }

    /// Range-check every field the cycle depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let samples = usize::from(self.sampling.samples);
        if samples == 0 || samples > MAX_SAMPLES {
            return Err(ConfigError::ValidationFailed("sampling.samples must be 1..=32"));
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("interval_secs must be > 0"));
        }
        if self.sensor.shunt_mohm == 0 {
            return Err(ConfigError::ValidationFailed("sensor.shunt_mohm must be > 0"));
        }
        if self.sensor.full_scale_drop_mv <= 0.0 {
            return Err(ConfigError::ValidationFailed("sensor.full_scale_drop_mv must be > 0"));
        }
        if self.sensor.address > 0x7F {
            return Err(ConfigError::ValidationFailed("sensor.address must be 7-bit"));
        }

        let bat = &self.battery;
        if bat.mean_count == 0 {
            return Err(ConfigError::ValidationFailed("battery.mean_count must be > 0"));
        }
        if bat.empty_v >= bat.full_v {
            return Err(ConfigError::ValidationFailed("battery.empty_v must be below full_v"));
        }
        if !(0.0..=1.0).contains(&bat.critical_threshold) {
            return Err(ConfigError::ValidationFailed("battery.critical_threshold must be 0..=1"));
        }
        if bat.adc_bits == 0 || bat.adc_bits > 16 {
            return Err(ConfigError::ValidationFailed("battery.adc_bits must be 1..=16"));
        }

        let ssid = self.wifi.ssid.as_str();
        if ssid.is_empty() || !is_printable_ascii(ssid) {
            return Err(ConfigError::ValidationFailed("wifi.ssid must be 1-32 printable ASCII bytes"));
        }
        let psk_len = self.wifi.psk.len();
        if psk_len != 0 && psk_len < 8 {
            return Err(ConfigError::ValidationFailed("wifi.psk must be empty or 8-64 bytes"));
        }
        if self.wifi.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("wifi.connect_timeout_ms must be > 0"));
        }

        if self.mqtt.host.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt.host must not be empty"));
        }
        if self.mqtt.topic.is_empty() || !is_printable_ascii(&self.mqtt.topic) {
            return Err(ConfigError::ValidationFailed("mqtt.topic must be non-empty printable ASCII"));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sensor: SensorConfig::default(),
            rail: RailConfig::default(),
            sampling: SamplingConfig::default(),
            battery: BatteryConfig::default(),
            wifi: WifiConfig::default(),
            mqtt: MqttConfig::default(),
            interval_secs: 12,
            network_retry_sleep_secs: None,
        }
    }
}

/// Copy as much of `s` as fits into a fixed-capacity string.
pub(crate) fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Space through tilde; rejects control bytes and anything non-ASCII.
fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}
