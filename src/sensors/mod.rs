//! Sensor subsystem: INA226 driver, battery monitor, and noise-reduced
//! acquisition.
//!
//! [`acquire`] takes a burst of single-shot reads from the powered sensor
//! and reduces each field independently with a median, which rejects
//! single-sample spikes from bus noise or settling artifacts better than a
//! mean.  Correction and the derived quantities (mA, W) are computed once
//! on the aggregate and are never re-sampled.

pub mod battery;
pub mod ina226;

use core::fmt;

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::app::ports::{RailPin, SensorBus, ShuntSensor};
use crate::config::{CurrentCorrection, MAX_SAMPLES, SamplingConfig};
use crate::error::{Error, Result, SensorError};
use crate::power::PowerSequencer;

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One corrected measurement, in volts / amperes / watts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub shunt_v: f32,
    pub bus_v: f32,
    pub current_a: f32,
    pub current_ma: f32,
    pub power_w: f32,
}

impl fmt::Display for SensorReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shunt_v={:.6}V,bus_v={:.3}V,current={:.6}mA,power={:.6}W",
            self.shunt_v, self.bus_v, self.current_ma, self.power_w
        )
    }
}

// ---------------------------------------------------------------------------
// Sample set
// ---------------------------------------------------------------------------

/// Raw per-field values of one single-shot read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub shunt_mv: f32,
    pub bus_v: f32,
    pub current_a: f32,
}

/// Samples collected during one acquisition.  Never outlives the call.
#[derive(Debug, Default)]
pub struct SampleSet {
    samples: heapless::Vec<RawSample, MAX_SAMPLES>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample.  Returns `false` once the set is full.
    pub fn push(&mut self, sample: RawSample) -> bool {
        self.samples.push(sample).is_ok()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Per-field median, corrected.  `None` for an empty set.
    pub fn reduce(&self, correction: &CurrentCorrection) -> Option<SensorReading> {
        let raw = match self.samples.as_slice() {
            [] => return None,
            [only] => *only,
            many => RawSample {
                shunt_mv: median_of(many, |s| s.shunt_mv)?,
                bus_v: median_of(many, |s| s.bus_v)?,
                current_a: median_of(many, |s| s.current_a)?,
            },
        };

        let current_a = correction.apply(raw.current_a);
        Some(SensorReading {
            shunt_v: raw.shunt_mv / 1000.0,
            bus_v: raw.bus_v,
            current_a,
            current_ma: current_a * 1000.0,
            power_w: raw.bus_v * current_a,
        })
    }
}

fn median_of(samples: &[RawSample], field: impl Fn(&RawSample) -> f32) -> Option<f32> {
    let mut values: heapless::Vec<f32, MAX_SAMPLES> = samples.iter().map(field).collect();
    median(&mut values)
}

/// Standard median: middle value for odd counts, mean of the two central
/// values for even counts.  Sorts `values` in place.
pub fn median(values: &mut [f32]) -> Option<f32> {
    match values.len() {
        0 => None,
        1 => Some(values[0]),
        n => {
            values.sort_unstable_by(f32::total_cmp);
            let mid = n / 2;
            if n % 2 == 1 {
                Some(values[mid])
            } else {
                Some((values[mid - 1] + values[mid]) / 2.0)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Acquisition
// ---------------------------------------------------------------------------

/// Take `sampling.samples` reads from the powered sensor and reduce them.
///
/// Fails with [`Error::NotPowered`](crate::error::Error::NotPowered) before
/// any bus access if the rail is off; any failed read aborts the burst.
pub fn acquire<P: RailPin, B: SensorBus>(
    rail: &mut PowerSequencer<P, B>,
    sampling: &SamplingConfig,
    correction: &CurrentCorrection,
    delay: &mut impl DelayNs,
) -> Result<SensorReading> {
    let sensor = rail.sensor()?;
    let count = usize::from(sampling.samples).clamp(1, MAX_SAMPLES);

    let mut set = SampleSet::new();
    for i in 0..count {
        let sample = RawSample {
            shunt_mv: sensor.shunt_voltage_mv()?,
            bus_v: sensor.bus_voltage_v()?,
            current_a: sensor.current_a()?,
        };
        debug!("Sample {}/{}: {:?}", i + 1, count, sample);
        set.push(sample);

        if i + 1 < count {
            delay.delay_ms(sampling.inter_sample_ms);
        }
    }

    set.reduce(correction).ok_or(Error::Sensor(SensorError::NoData))
}
