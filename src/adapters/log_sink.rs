//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing one structured line per cycle event
//! to the ESP-IDF logger (UART / USB-CDC in production, stderr on host).

use core::fmt::Write as _;

use log::{Level, log};

use crate::app::events::CycleEvent;
use crate::app::ports::{EventSink, SleepDirective};
use crate::delivery::DeliveryOutcome;

/// One rendered log line.
pub type Line = heapless::String<160>;

/// Level and text for an event.  Lines that overflow are truncated.
pub fn render(event: &CycleEvent) -> (Level, Line) {
    let mut line = Line::new();
    let level = match event {
        CycleEvent::Started => {
            let _ = write!(line, "WAKE  | cycle started");
            Level::Info
        }
        CycleEvent::StateChanged { from, to } => {
            let _ = write!(line, "STATE | {} -> {}", from, to);
            Level::Info
        }
        CycleEvent::Reading(r) => {
            let _ = write!(line, "READ  | {}", r);
            Level::Info
        }
        CycleEvent::Battery(b) => {
            let _ = write!(
                line,
                "BATT  | {:.3}V {:.1}%{}",
                b.voltage_v,
                b.percentage,
                if b.critical { " CRITICAL" } else { "" }
            );
            if b.critical { Level::Warn } else { Level::Info }
        }
        CycleEvent::Published(DeliveryOutcome::Delivered) => {
            let _ = write!(line, "PUB   | delivered");
            Level::Info
        }
        CycleEvent::Published(DeliveryOutcome::Failed(e)) => {
            let _ = write!(line, "PUB   | failed: {}", e);
            Level::Warn
        }
        CycleEvent::Aborted { state, error } => {
            let _ = write!(line, "ABORT | in {}: {}", state, error);
            if error.is_fault() { Level::Error } else { Level::Warn }
        }
        CycleEvent::Sleeping {
            directive: SleepDirective::Timed(ms),
            elapsed_ms,
        } => {
            let _ = write!(line, "SLEEP | {} ms (awake {} ms)", ms, elapsed_ms);
            Level::Info
        }
        CycleEvent::Sleeping {
            directive: SleepDirective::Indefinite,
            elapsed_ms,
        } => {
            let _ = write!(line, "SLEEP | indefinite (awake {} ms)", elapsed_ms);
            Level::Info
        }
    };
    (level, line)
}

/// Adapter that logs every [`CycleEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &CycleEvent) {
        let (level, line) = render(event);
        log!(level, "{}", line);
    }
}
