//! Battery sense input on an ADC1 oneshot channel.

use log::debug;

use crate::app::ports::BatteryAdc;
use crate::drivers::hw_init::{self, HwInitError};
use crate::error::SensorError;

pub struct Adc1BatteryInput {
    /// `None` when ADC1 could not be brought up.
    channel: Option<u32>,
}

impl Adc1BatteryInput {
    /// Configure ADC1 for the given sense pin.
    pub fn new(pin: i32) -> Result<Self, HwInitError> {
        let channel = hw_init::init_adc(pin)?;
        Ok(Self {
            channel: Some(channel),
        })
    }

    /// An input whose every read fails.
    pub fn unavailable() -> Self {
        Self { channel: None }
    }

    pub fn channel(&self) -> Option<u32> {
        self.channel
    }
}

impl BatteryAdc for Adc1BatteryInput {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        let channel = self.channel.ok_or(SensorError::AdcReadFailed)?;
        hw_init::adc1_read(channel).map_err(|rc| {
            debug!("ADC1 CH{}: rc={}", channel, rc);
            SensorError::AdcReadFailed
        })
    }
}
