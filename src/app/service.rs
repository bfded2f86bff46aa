//! Cycle service, the hexagonal core.
//!
//! [`CycleService`] runs exactly one wake cycle against injected hardware
//! and returns a [`CycleReport`].  It never returns an error: every stage
//! failure is caught here, the rail is forced off, and the report carries
//! the [`SleepDirective`] the entry point hands to the deep-sleep port.
//!
//! ```text
//!  RailPin/SensorBus ──▶ ┌──────────────────────┐ ──▶ EventSink
//!  BatteryAdc        ──▶ │    CycleService       │
//!  Radio/Transport   ◀── │  FSM · abort policy   │ ──▶ CycleReport
//!                        └──────────────────────┘
//! ```

use embedded_hal::delay::DelayNs;
use log::{error, info};

use crate::config::NodeConfig;
use crate::delivery::{CycleResult, DeliveryOutcome, Publisher};
use crate::error::{Error, Result};
use crate::fsm::{CycleFsm, CycleState};
use crate::network::{ConnectOutcome, NetworkSession};
use crate::power::PowerSequencer;
use crate::sensors::{self, battery::BatteryMonitor};

use super::events::CycleEvent;
use super::ports::{
    BatteryAdc, DeliveryTransport, EventSink, Radio, RailPin, SensorBus, SleepDirective, WakeClock,
};

/// Time left in the wake-to-wake period, floored at zero.
pub fn sleep_duration_ms(interval_ms: u64, elapsed_ms: u64) -> u64 {
    interval_ms.saturating_sub(elapsed_ms)
}

// ───────────────────────────────────────────────────────────────
// Hardware bundle
// ───────────────────────────────────────────────────────────────

/// Every driven adapter the cycle touches, owned for one wake.
pub struct CycleHardware<P: RailPin, B: SensorBus, A: BatteryAdc, R: Radio, T: DeliveryTransport> {
    pub rail: PowerSequencer<P, B>,
    pub battery: BatteryMonitor<A>,
    pub radio: R,
    pub transport: T,
}

impl<P: RailPin, B: SensorBus, A: BatteryAdc, R: Radio, T: DeliveryTransport>
    CycleHardware<P, B, A, R, T>
{
    pub fn new(rail_pin: P, bus: B, adc: A, radio: R, transport: T, config: &NodeConfig) -> Self {
        Self {
            rail: PowerSequencer::new(rail_pin, bus, config),
            battery: BatteryMonitor::new(adc, &config.battery),
            radio,
            transport,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Report
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Delivered,
    Aborted(Error),
}

/// What one wake cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Present once a reading was acquired, even if delivery failed.
    pub result: Option<CycleResult>,
    /// Wake start to sleep decision.
    pub elapsed_ms: u64,
    pub directive: SleepDirective,
    pub final_state: CycleState,
    pub path: heapless::Vec<CycleState, 16>,
}

// ───────────────────────────────────────────────────────────────
// CycleService
// ───────────────────────────────────────────────────────────────

pub struct CycleService<'a, C: WakeClock, D: DelayNs> {
    config: &'a NodeConfig,
    clock: C,
    delay: D,
    fsm: CycleFsm,
}

impl<'a, C: WakeClock, D: DelayNs> CycleService<'a, C, D> {
    pub fn new(config: &'a NodeConfig, clock: C, delay: D) -> Self {
        Self {
            config,
            clock,
            delay,
            fsm: CycleFsm::new(),
        }
    }

    /// Run the cycle to its sleep decision.  Consumes the service.
    pub fn run<P, B, A, R, T>(
        mut self,
        hw: &mut CycleHardware<P, B, A, R, T>,
        sink: &mut impl EventSink,
    ) -> CycleReport
    where
        P: RailPin,
        B: SensorBus,
        A: BatteryAdc,
        R: Radio,
        T: DeliveryTransport,
    {
        sink.emit(&CycleEvent::Started);

        let mut result = None;
        let outcome = match self.stages(hw, sink, &mut result) {
            Ok(()) => CycleOutcome::Delivered,
            Err(e) => {
                self.abort(hw, sink, e);
                CycleOutcome::Aborted(e)
            }
        };

        let elapsed_ms = self.clock.millis_since_wake();
        let directive = self.sleep_directive(outcome, result.as_ref(), elapsed_ms);
        self.transition(CycleState::Sleep, sink);
        sink.emit(&CycleEvent::Sleeping {
            directive,
            elapsed_ms,
        });

        CycleReport {
            outcome,
            result,
            elapsed_ms,
            directive,
            final_state: self.fsm.current(),
            path: self.fsm.path().iter().copied().collect(),
        }
    }

    fn stages<P, B, A, R, T>(
        &mut self,
        hw: &mut CycleHardware<P, B, A, R, T>,
        sink: &mut impl EventSink,
        result: &mut Option<CycleResult>,
    ) -> Result<()>
    where
        P: RailPin,
        B: SensorBus,
        A: BatteryAdc,
        R: Radio,
        T: DeliveryTransport,
    {
        let config = self.config;

        self.transition(CycleState::RailOn, sink);
        hw.rail.power_on(&mut self.delay)?;

        self.transition(CycleState::Sampling, sink);
        let reading = sensors::acquire(
            &mut hw.rail,
            &config.sampling,
            &config.sensor.correction,
            &mut self.delay,
        )?;
        sink.emit(&CycleEvent::Reading(reading));

        self.transition(CycleState::RailOff, sink);
        hw.rail.power_off();

        let battery = hw.battery.read(&mut self.delay);
        if let Some(status) = battery {
            sink.emit(&CycleEvent::Battery(status));
        }
        let cycle_result = CycleResult { reading, battery };
        *result = Some(cycle_result);

        self.transition(CycleState::NetworkUp, sink);
        let mut session = NetworkSession::new(&mut hw.radio, &config.wifi);
        if session.connect(config.wifi.connect_timeout_ms, &self.clock, &mut self.delay)
            == ConnectOutcome::TimedOut
        {
            session.close();
            return Err(Error::NetworkTimeout);
        }

        self.transition(CycleState::Publishing, sink);
        let delivery = Publisher::new(&mut hw.transport, &config.mqtt).publish(&cycle_result);
        session.close();
        sink.emit(&CycleEvent::Published(delivery));

        match delivery {
            DeliveryOutcome::Delivered => Ok(()),
            DeliveryOutcome::Failed(e) => Err(Error::Delivery(e)),
        }
    }

    /// Common abort path: report, then force the rail down.
    fn abort<P, B, A, R, T>(
        &mut self,
        hw: &mut CycleHardware<P, B, A, R, T>,
        sink: &mut impl EventSink,
        error: Error,
    ) where
        P: RailPin,
        B: SensorBus,
        A: BatteryAdc,
        R: Radio,
        T: DeliveryTransport,
    {
        let state = self.fsm.current();
        if error.is_fault() {
            error!("Cycle aborted in {}: {}", state, error);
        } else {
            info!("Cycle ended early in {}: {}", state, error);
        }
        sink.emit(&CycleEvent::Aborted { state, error });
        if state != CycleState::RailOff {
            self.transition(CycleState::RailOff, sink);
        }
        hw.rail.power_off();
    }

    fn sleep_directive(
        &self,
        outcome: CycleOutcome,
        result: Option<&CycleResult>,
        elapsed_ms: u64,
    ) -> SleepDirective {
        match (outcome, self.config.network_retry_sleep_secs) {
            (CycleOutcome::Delivered, _)
                if self.config.battery.hibernate_when_critical
                    && result.is_some_and(CycleResult::battery_critical) =>
            {
                info!("Battery critical, hibernating");
                SleepDirective::Indefinite
            }
            (CycleOutcome::Aborted(Error::NetworkTimeout), Some(retry_secs)) => {
                SleepDirective::Timed(u64::from(retry_secs) * 1000)
            }
            _ => SleepDirective::Timed(sleep_duration_ms(self.config.interval_ms(), elapsed_ms)),
        }
    }

    fn transition(&mut self, to: CycleState, sink: &mut impl EventSink) {
        let from = self.fsm.advance(to);
        sink.emit(&CycleEvent::StateChanged { from, to });
    }
}
