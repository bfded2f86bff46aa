//! Bench monitor mode.
//!
//! Keeps the sensor rail powered and streams readings at a fixed period
//! instead of sleeping between them.  Used on the bench to watch a load
//! live over the serial console.  The rail is always switched off when the
//! session ends, whether it completed or failed.

use embedded_hal::delay::DelayNs;
use log::info;

use crate::config::NodeConfig;
use crate::error::Result;
use crate::power::PowerSequencer;
use crate::sensors;

use super::events::CycleEvent;
use super::ports::{EventSink, RailPin, SensorBus};

pub struct MonitorSession<'a, P: RailPin, B: SensorBus> {
    rail: &'a mut PowerSequencer<P, B>,
    config: &'a NodeConfig,
}

impl<'a, P: RailPin, B: SensorBus> MonitorSession<'a, P, B> {
    pub fn new(rail: &'a mut PowerSequencer<P, B>, config: &'a NodeConfig) -> Self {
        Self { rail, config }
    }

    /// Emit `iterations` readings, `period_ms` apart.  Returns how many
    /// were taken.
    pub fn run(
        &mut self,
        iterations: u32,
        period_ms: u32,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<u32> {
        let taken = self.stream(iterations, period_ms, delay, sink);
        self.rail.power_off();
        let taken = taken?;
        info!("Monitor: {} readings", taken);
        Ok(taken)
    }

    fn stream(
        &mut self,
        iterations: u32,
        period_ms: u32,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<u32> {
        self.rail.power_on(delay)?;
        for i in 0..iterations {
            let reading = sensors::acquire(
                &mut *self.rail,
                &self.config.sampling,
                &self.config.sensor.correction,
                delay,
            )?;
            sink.emit(&CycleEvent::Reading(reading));
            if i + 1 < iterations {
                delay.delay_ms(period_ms);
            }
        }
        Ok(iterations)
    }
}
