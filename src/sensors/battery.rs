//! Battery state-of-charge estimate from the divided cell voltage.
//!
//! The cell is read through a 1:1 resistor divider on an ADC1 pin.  Raw
//! codes are oversampled and floor-averaged; the averaged code maps
//! linearly onto `0..=vref` at the pin and then back up by the divider
//! ratio.  The percentage is a linear interpolation between the configured
//! empty and full voltages, clamped to `0..=100`.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::BatteryAdc;
use crate::config::BatteryConfig;

/// Gap between successive ADC conversions.
pub const SAMPLE_DELAY_MS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryStatus {
    pub voltage_v: f32,
    /// 0..=100, clamped.
    pub percentage: f32,
    pub critical: bool,
}

/// Linear state of charge between `empty_v` (0 %) and `full_v` (100 %).
pub fn percentage_for_voltage(voltage_v: f32, empty_v: f32, full_v: f32) -> f32 {
    let span = full_v - empty_v;
    if span <= 0.0 {
        return 0.0;
    }
    ((voltage_v - empty_v) / span).clamp(0.0, 1.0) * 100.0
}

/// Cell voltage for an averaged raw code.
pub fn voltage_for_code(code: u32, config: &BatteryConfig) -> f32 {
    let full_scale = ((1u32 << config.adc_bits) - 1) as f32;
    let pin_v = code as f32 / full_scale * config.vref;
    pin_v * config.divider_ratio
}

pub struct BatteryMonitor<A: BatteryAdc> {
    adc: A,
    config: BatteryConfig,
}

impl<A: BatteryAdc> BatteryMonitor<A> {
    pub fn new(adc: A, config: &BatteryConfig) -> Self {
        Self {
            adc,
            config: config.clone(),
        }
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }

    /// Oversample the ADC and derive the battery status.
    ///
    /// `None` when monitoring is disabled or any conversion fails.
    pub fn read(&mut self, delay: &mut impl DelayNs) -> Option<BatteryStatus> {
        if !self.config.enabled {
            return None;
        }

        let count = u32::from(self.config.mean_count.max(1));
        let mut sum = 0u32;
        for i in 0..count {
            match self.adc.read_raw() {
                Ok(code) => sum += u32::from(code),
                Err(e) => {
                    warn!("Battery: {} (sample {}/{})", e, i + 1, count);
                    return None;
                }
            }
            delay.delay_ms(SAMPLE_DELAY_MS);
        }
        let avg = sum / count;

        let voltage_v = voltage_for_code(avg, &self.config);
        let percentage = percentage_for_voltage(voltage_v, self.config.empty_v, self.config.full_v);
        let critical = percentage / 100.0 <= self.config.critical_threshold;
        debug!("Battery: code={} {:.3}V {:.1}%", avg, voltage_v, percentage);

        Some(BatteryStatus {
            voltage_v,
            percentage,
            critical,
        })
    }
}
