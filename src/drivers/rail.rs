//! Sensor rail gate (AO3401 P-channel high-side switch).
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the GPIO and the pad hold via hw_init helpers.
//! On host/test: tracks the level in-memory only.

use crate::app::ports::RailPin;
use crate::config::Level;
use crate::drivers::hw_init::{self, HwInitError};

pub struct GpioRailPin {
    pin: i32,
    level_high: Option<bool>,
    held: bool,
}

impl GpioRailPin {
    pub fn new(pin: i32) -> Self {
        Self {
            pin,
            level_high: None,
            held: false,
        }
    }

    /// Configure the gate as an output that starts at the disabled level,
    /// so bringing the pad up never energises the rail.
    pub fn configure(pin: i32, enable_level: Level) -> Result<Self, HwInitError> {
        let disabled_high = !enable_level.is_high();
        hw_init::init_output(pin, disabled_high)?;
        Ok(Self {
            pin,
            level_high: Some(disabled_high),
            held: false,
        })
    }

    /// Last level written this wake, if any.
    pub fn level_high(&self) -> Option<bool> {
        self.level_high
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

impl RailPin for GpioRailPin {
    fn set_high(&mut self, high: bool) {
        hw_init::gpio_write(self.pin, high);
        self.level_high = Some(high);
    }

    fn hold_during_sleep(&mut self, hold: bool) {
        hw_init::gpio_hold(self.pin, hold);
        self.held = hold;
    }
}
