//! Rail gate and battery ADC drivers, plus one-shot peripheral setup.

pub mod battery_adc;
pub mod hw_init;
pub mod rail;
