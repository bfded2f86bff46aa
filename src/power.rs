//! Sensor power-domain sequencing.
//!
//! The INA226 sits behind a high-side switch so it draws nothing while the
//! node sleeps.  [`PowerSequencer`] owns both the rail pin and the sensor
//! bus; the device handle lives inside it and only exists while the domain
//! is [`PowerDomain::On`], so bus traffic with the rail down is impossible
//! by construction.
//!
//! ```text
//!   Off ──power_on()──▶ release hold → drive enable → settle → open + calibrate
//!    ▲                         → first conversion ──▶ On
//!    │                                 │ open failed / no conversion
//!    └──── drive disable → hold ◀─────┘
//!   On ──power_off()──▶ close device → drive disable → hold ──▶ Off
//! ```

use embedded_hal::delay::DelayNs;
use log::{error, info, warn};

use crate::app::ports::{RailPin, SensorBus, ShuntSensor};
use crate::config::{Level, NodeConfig};
use crate::error::{Error, Result};

/// State of the switched sensor rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerDomain {
    Off,
    On,
}

/// Owns the rail gate and the sensor bus for one wake cycle.
pub struct PowerSequencer<P: RailPin, B: SensorBus> {
    pin: P,
    bus: B,
    device: Option<B::Device>,
    enable_level: Level,
    settle_ms: u32,
    address: u8,
    shunt_mohm: u32,
    full_scale_drop_mv: f32,
}

impl<P: RailPin, B: SensorBus> PowerSequencer<P, B> {
    /// Construct in the `Off` state.  The pin is not touched: after a wake
    /// it is still held at the level requested before sleep.
    pub fn new(pin: P, bus: B, config: &NodeConfig) -> Self {
        Self {
            pin,
            bus,
            device: None,
            enable_level: config.rail.enable_level,
            settle_ms: config.rail.settle_ms,
            address: config.sensor.address,
            shunt_mohm: config.sensor.shunt_mohm,
            full_scale_drop_mv: config.sensor.full_scale_drop_mv,
        }
    }

    pub fn domain(&self) -> PowerDomain {
        if self.device.is_some() {
            PowerDomain::On
        } else {
            PowerDomain::Off
        }
    }

    /// Energise the rail and bring the sensor up.  No-op when already on.
    ///
    /// A calibration failure is logged and the device is used uncalibrated.
    /// Returns only once the first conversion after reset has landed.  If
    /// the device does not answer or never converts, the rail is switched
    /// back off (with pin-hold requested) and [`Error::SensorInit`] is
    /// returned.
    pub fn power_on(&mut self, delay: &mut impl DelayNs) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }

        self.pin.hold_during_sleep(false);
        self.pin.set_high(self.enable_level.is_high());
        delay.delay_ms(self.settle_ms);

        let mut device = match self.bus.open(self.address) {
            Ok(device) => device,
            Err(e) => {
                error!("Rail: sensor 0x{:02X} did not respond ({})", self.address, e);
                self.drive_disabled();
                return Err(Error::SensorInit(e));
            }
        };

        if let Err(e) = device.calibrate(self.shunt_mohm, self.full_scale_drop_mv) {
            warn!("Rail: calibration failed ({}), continuing uncalibrated", e);
        }
        if let Err(e) = device.await_conversion(delay) {
            error!("Rail: sensor 0x{:02X} not converting ({})", self.address, e);
            self.bus.close(device);
            self.drive_disabled();
            return Err(Error::SensorInit(e));
        }

        self.device = Some(device);
        info!("Rail: on (sensor 0x{:02X} ready)", self.address);
        Ok(())
    }

    /// Tear the sensor down and switch the rail off.  No-op when already off.
    pub fn power_off(&mut self) {
        if let Some(device) = self.device.take() {
            self.bus.close(device);
            self.drive_disabled();
            info!("Rail: off (held through sleep)");
        }
    }

    /// The open sensor, or [`Error::NotPowered`] while the rail is down.
    pub fn sensor(&mut self) -> Result<&mut B::Device> {
        self.device.as_mut().ok_or(Error::NotPowered)
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    fn drive_disabled(&mut self) {
        park_rail(&mut self.pin, self.enable_level);
    }
}

/// Drive the rail to its disabled level and latch it through sleep.
///
/// Also used by the entry point when bootstrap fails before a
/// [`PowerSequencer`] exists.
pub fn park_rail(pin: &mut impl RailPin, enable_level: Level) {
    pin.set_high(!enable_level.is_high());
    pin.hold_during_sleep(true);
}
