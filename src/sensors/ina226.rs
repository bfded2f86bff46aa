//! TI INA226 current/voltage/power monitor driver.
//!
//! Generic over [`embedded_hal::i2c::I2c`] so the same code runs against
//! the ESP-IDF I2C master on target and an in-memory register file in host
//! tests.
//!
//! | Register | Addr | LSB |
//! |----------|------|-----|
//! | Config   | 0x00 | —   |
//! | Shunt V  | 0x01 | 2.5 µV (signed) |
//! | Bus V    | 0x02 | 1.25 mV |
//! | Current  | 0x04 | `current_lsb` (signed) |
//! | Calib    | 0x05 | — |
//! | Mask/En  | 0x06 | bit 3 = conversion ready (cleared on read) |
//! | Mfr ID   | 0xFE | reads 0x5449 ("TI") |

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, warn};

use crate::app::ports::{SensorBus, ShuntSensor};
use crate::error::SensorError;

const REG_CONFIG: u8 = 0x00;
const REG_SHUNT_VOLTAGE: u8 = 0x01;
const REG_BUS_VOLTAGE: u8 = 0x02;
const REG_CURRENT: u8 = 0x04;
const REG_CALIBRATION: u8 = 0x05;
const REG_MASK_ENABLE: u8 = 0x06;
const REG_MANUFACTURER_ID: u8 = 0xFE;

const TI_MANUFACTURER_ID: u16 = 0x5449;
const CONFIG_RESET: u16 = 0x8000;
/// AVG=1, VBUSCT=VSHCT=1.1 ms, shunt and bus continuous.
const CONFIG_CONTINUOUS: u16 = 0x4127;

/// Conversion Ready Flag in Mask/Enable.
const MASK_CVRF: u16 = 1 << 3;
/// Covers shunt + bus at the longest conversion time (2 × 8.244 ms); the
/// configured 1.1 ms CT is ready after ~2.2 ms.
const READY_TIMEOUT_MS: u32 = 20;
const READY_POLL_MS: u32 = 1;

const SHUNT_LSB_MV: f32 = 0.002_5;
const BUS_LSB_V: f32 = 0.001_25;
/// Fixed scaling constant from the datasheet calibration equation.
const CAL_SCALE: f32 = 0.005_12;
/// Bit 15 of the calibration register is reserved.
const CAL_MAX: f32 = 0x7FFF as f32;

/// Compute `(calibration register, current LSB in amperes)` for a shunt.
///
/// `current_lsb = I_max / 2^15` with `I_max = full_scale_drop / R_shunt`,
/// and `CAL = 0.00512 / (current_lsb * R_shunt)`.
pub fn calibration_for(shunt_mohm: u32, full_scale_drop_mv: f32) -> Result<(u16, f32), SensorError> {
    if shunt_mohm == 0 || full_scale_drop_mv <= 0.0 {
        return Err(SensorError::CalibrationOutOfRange);
    }
    let shunt_ohm = shunt_mohm as f32 / 1000.0;
    let max_current_a = full_scale_drop_mv / shunt_mohm as f32;
    let current_lsb_a = max_current_a / 32_768.0;
    let cal = (CAL_SCALE / (current_lsb_a * shunt_ohm)).round();
    if !(1.0..=CAL_MAX).contains(&cal) {
        return Err(SensorError::CalibrationOutOfRange);
    }
    Ok((cal as u16, current_lsb_a))
}

/// An INA226 that answered its identity probe.
pub struct Ina226<I2C> {
    i2c: I2C,
    address: u8,
    /// Zero until calibrated; the chip reports zero current in that state.
    current_lsb_a: f32,
}

impl<I2C: I2c> Ina226<I2C> {
    /// Check the manufacturer id, reset, and enable continuous conversion.
    ///
    /// On failure the bus is handed back alongside the error.
    pub fn probe(i2c: I2C, address: u8) -> Result<Self, (SensorError, I2C)> {
        let mut dev = Self {
            i2c,
            address,
            current_lsb_a: 0.0,
        };
        match dev.init() {
            Ok(()) => Ok(dev),
            Err(e) => Err((e, dev.i2c)),
        }
    }

    fn init(&mut self) -> Result<(), SensorError> {
        let id = self.read_register(REG_MANUFACTURER_ID)?;
        if id != TI_MANUFACTURER_ID {
            return Err(SensorError::UnexpectedDevice(id));
        }
        self.write_register(REG_CONFIG, CONFIG_RESET)?;
        self.write_register(REG_CONFIG, CONFIG_CONTINUOUS)?;
        debug!("INA226@0x{:02X}: configured 0x{:04X}", self.address, CONFIG_CONTINUOUS);
        Ok(())
    }

    /// Give the bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn is_calibrated(&self) -> bool {
        self.current_lsb_a > 0.0
    }

    fn read_register(&mut self, reg: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| SensorError::BusFault)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), SensorError> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.address, &[reg, hi, lo])
            .map_err(|_| SensorError::BusFault)
    }
}

impl<I2C: I2c> ShuntSensor for Ina226<I2C> {
    fn calibrate(&mut self, shunt_mohm: u32, full_scale_drop_mv: f32) -> Result<(), SensorError> {
        let (cal, current_lsb_a) = calibration_for(shunt_mohm, full_scale_drop_mv)?;
        self.write_register(REG_CALIBRATION, cal)?;
        self.current_lsb_a = current_lsb_a;
        debug!("INA226@0x{:02X}: CAL={} LSB={:e}A", self.address, cal, current_lsb_a);
        Ok(())
    }

    fn shunt_voltage_mv(&mut self) -> Result<f32, SensorError> {
        let raw = self.read_register(REG_SHUNT_VOLTAGE)? as i16;
        Ok(f32::from(raw) * SHUNT_LSB_MV)
    }

    fn bus_voltage_v(&mut self) -> Result<f32, SensorError> {
        let raw = self.read_register(REG_BUS_VOLTAGE)?;
        Ok(f32::from(raw) * BUS_LSB_V)
    }

    fn current_a(&mut self) -> Result<f32, SensorError> {
        let raw = self.read_register(REG_CURRENT)? as i16;
        Ok(f32::from(raw) * self.current_lsb_a)
    }

    /// Poll CVRF.  Reset zeroes the data registers, so nothing is valid
    /// until the first shunt + bus conversion after it completes.
    fn await_conversion(&mut self, delay: &mut impl DelayNs) -> Result<(), SensorError> {
        let mut waited_ms = 0;
        loop {
            if self.read_register(REG_MASK_ENABLE)? & MASK_CVRF != 0 {
                debug!("INA226@0x{:02X}: conversion ready after {} ms", self.address, waited_ms);
                return Ok(());
            }
            if waited_ms >= READY_TIMEOUT_MS {
                warn!("INA226@0x{:02X}: no conversion within {} ms", self.address, READY_TIMEOUT_MS);
                return Err(SensorError::ConversionTimeout);
            }
            delay.delay_ms(READY_POLL_MS);
            waited_ms += READY_POLL_MS;
        }
    }
}

// ---------------------------------------------------------------------------
// Bus ownership
// ---------------------------------------------------------------------------

/// Holds the I2C peripheral while the sensor is unpowered and lends it to
/// an [`Ina226`] while powered.
pub struct Ina226Bus<I2C> {
    i2c: Option<I2C>,
}

impl<I2C: I2c> Ina226Bus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c: Some(i2c) }
    }
}

impl<I2C: I2c> SensorBus for Ina226Bus<I2C> {
    type Device = Ina226<I2C>;

    fn open(&mut self, address: u8) -> Result<Ina226<I2C>, SensorError> {
        let i2c = self.i2c.take().ok_or(SensorError::BusUnavailable)?;
        Ina226::probe(i2c, address).map_err(|(e, i2c)| {
            self.i2c = Some(i2c);
            e
        })
    }

    fn close(&mut self, device: Ina226<I2C>) {
        self.i2c = Some(device.release());
    }
}
