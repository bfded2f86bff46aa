//! Shuntmeter firmware main entry point.
//!
//! One wake cycle per boot; every path ends in deep sleep.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  GpioRailPin    Ina226Bus     Adc1BatteryInput   Esp32Time     │
//! │  (RailPin)      (SensorBus)   (BatteryAdc)       (WakeClock)   │
//! │  WifiRadio      MqttTransport LogEventSink       DeepSleep     │
//! │  (Radio)        (Delivery)    (EventSink)        (sleep port)  │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        CycleService (pure logic) → CycleReport         │    │
//! │  │  PowerSequencer · acquire · NetworkSession · Publisher │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::gpio::AnyIOPin;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use shuntmeter::adapters::device_id;
use shuntmeter::adapters::log_sink::LogEventSink;
use shuntmeter::adapters::mqtt::MqttTransport;
use shuntmeter::adapters::sleep::DeepSleep;
use shuntmeter::adapters::time::{Esp32TimeAdapter, SystemDelay};
use shuntmeter::adapters::wifi::WifiRadio;
use shuntmeter::app::monitor::MonitorSession;
use shuntmeter::app::ports::{DeepSleepPort, SleepDirective};
use shuntmeter::app::service::{CycleHardware, CycleService};
use shuntmeter::config::NodeConfig;
use shuntmeter::drivers::battery_adc::Adc1BatteryInput;
use shuntmeter::drivers::rail::GpioRailPin;
use shuntmeter::power;
use shuntmeter::sensors::ina226::Ina226Bus;

/// Bench builds set this to stream readings instead of reporting.
const MONITOR_ITERATIONS: Option<&str> = option_env!("SHUNTMETER_MONITOR_ITERATIONS");

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    let clock = Esp32TimeAdapter::new();

    info!("╔══════════════════════════════════════╗");
    info!("║  Shuntmeter v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let config = NodeConfig::from_override(option_env!("SHUNTMETER_CONFIG_JSON"));

    // ── 3. Wake cycle ─────────────────────────────────────────
    let directive = match wake(&config, clock) {
        Ok(directive) => directive,
        Err(e) => {
            // Bootstrap failure: nothing was measured, try again next period.
            error!("Bootstrap failed: {:#}", e);
            park_rail(&config);
            SleepDirective::Timed(config.interval_ms())
        }
    };

    // ── 4. Deep sleep (never returns) ─────────────────────────
    DeepSleep::new().enter(directive)
}

/// Drive the rail gate disabled and hold it, whatever state bootstrap
/// left it in.
fn park_rail(config: &NodeConfig) {
    let mut pin = match GpioRailPin::configure(config.rail.pin, config.rail.enable_level) {
        Ok(pin) => pin,
        Err(e) => {
            warn!("Rail gate reconfigure failed ({}), forcing level", e);
            GpioRailPin::new(config.rail.pin)
        }
    };
    power::park_rail(&mut pin, config.rail.enable_level);
}

fn wake(config: &NodeConfig, clock: Esp32TimeAdapter) -> Result<SleepDirective> {
    // Rail gate first, starting disabled.  After a wake the pad is still
    // latched by the hold from the previous sleep.
    let rail_pin = GpioRailPin::configure(config.rail.pin, config.rail.enable_level)?;

    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // SAFETY: pin numbers come from validated config and are not claimed
    // by any other driver in this firmware.
    let (sda, scl) = unsafe {
        (
            AnyIOPin::new(config.sensor.sda_pin),
            AnyIOPin::new(config.sensor.scl_pin),
        )
    };
    let i2c_cfg = I2cConfig::new().baudrate(Hertz(config.sensor.i2c_freq_hz));
    let i2c = I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_cfg).context("I2C init")?;

    let mut config = config.clone();
    let adc = match Adc1BatteryInput::new(config.battery.adc_pin) {
        Ok(adc) => adc,
        Err(e) => {
            warn!("Battery monitor disabled: {}", e);
            config.battery.enabled = false;
            Adc1BatteryInput::unavailable()
        }
    };

    if let Some(iterations) = MONITOR_ITERATIONS.and_then(|s| s.parse::<u32>().ok()) {
        let mut rail = power::PowerSequencer::new(rail_pin, Ina226Bus::new(i2c), &config);
        let taken = MonitorSession::new(&mut rail, &config).run(
            iterations,
            config.interval_secs.saturating_mul(1000),
            &mut SystemDelay,
            &mut LogEventSink::new(),
        );
        if let Err(e) = taken {
            warn!("Monitor stopped: {}", e);
        }
        return Ok(SleepDirective::Timed(config.interval_ms()));
    }

    let wifi = EspWifi::new(peripherals.modem, sys_loop, Some(nvs))?;
    let transport = MqttTransport::new(&config.mqtt, &device_id::client_id(&device_id::read_mac()));

    let mut hw = CycleHardware::new(
        rail_pin,
        Ina226Bus::new(i2c),
        adc,
        WifiRadio::new(wifi),
        transport,
        &config,
    );
    let report = CycleService::new(&config, clock, SystemDelay).run(&mut hw, &mut LogEventSink::new());
    info!(
        "Cycle: {:?} in {} ms ({} states)",
        report.outcome,
        report.elapsed_ms,
        report.path.len()
    );
    Ok(report.directive)
}
