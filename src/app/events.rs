//! Outbound cycle events.
//!
//! The [`CycleService`](super::service::CycleService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, test recorder).

use crate::delivery::DeliveryOutcome;
use crate::error::Error;
use crate::fsm::CycleState;
use crate::sensors::SensorReading;
use crate::sensors::battery::BatteryStatus;

use super::ports::SleepDirective;

#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    /// A wake cycle began.
    Started,

    StateChanged { from: CycleState, to: CycleState },

    /// Aggregated sensor reading.
    Reading(SensorReading),

    Battery(BatteryStatus),

    /// Publish attempt finished.
    Published(DeliveryOutcome),

    /// The cycle gave up in `state` because of `error`.
    Aborted { state: CycleState, error: Error },

    /// Final decision, emitted right before the sleep call.
    Sleeping { directive: SleepDirective, elapsed_ms: u64 },
}
