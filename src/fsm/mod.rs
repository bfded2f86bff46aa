//! Wake-cycle state machine.
//!
//! One pass per wake, strictly forward:
//!
//! ```text
//!  Init ─▶ RailOn ─▶ Sampling ─▶ RailOff ─▶ NetworkUp ─▶ Publishing ─▶ Sleep
//!            │          │                      │             │
//!            └──────────┴───── error ──▶ RailOff ──▶ Sleep ◀─┘
//! ```
//!
//! Any stage may divert to `RailOff` on error; `RailOff` is idempotent, so
//! the abort path is the same wherever it starts.  `Sleep` is terminal.

use log::{debug, info};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CycleState {
    Init = 0,
    RailOn = 1,
    Sampling = 2,
    RailOff = 3,
    NetworkUp = 4,
    Publishing = 5,
    Sleep = 6,
}

impl CycleState {
    pub const COUNT: usize = 7;

    const NAMES: [&'static str; Self::COUNT] = [
        "Init",
        "RailOn",
        "Sampling",
        "RailOff",
        "NetworkUp",
        "Publishing",
        "Sleep",
    ];

    pub fn name(self) -> &'static str {
        Self::NAMES[self as usize]
    }

    /// Whether `self → next` is an edge of the cycle graph.
    pub fn can_advance_to(self, next: Self) -> bool {
        use CycleState::{Init, NetworkUp, Publishing, RailOff, RailOn, Sampling, Sleep};
        match (self, next) {
            (Sleep, _) => false,
            // Abort edge, from anywhere still awake.
            (_, RailOff) => self != RailOff,
            (Init, RailOn)
            | (RailOn, Sampling)
            | (RailOff, NetworkUp | Sleep)
            | (NetworkUp, Publishing)
            | (Publishing, Sleep) => true,
            _ => false,
        }
    }
}

impl core::fmt::Display for CycleState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

/// Tracks the current cycle state and records the path taken.
#[derive(Debug)]
pub struct CycleFsm {
    current: CycleState,
    /// Visited states in order, `Init` first.
    path: heapless::Vec<CycleState, 16>,
}

impl Default for CycleFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleFsm {
    pub fn new() -> Self {
        let mut path = heapless::Vec::new();
        let _ = path.push(CycleState::Init);
        Self {
            current: CycleState::Init,
            path,
        }
    }

    pub fn current(&self) -> CycleState {
        self.current
    }

    pub fn path(&self) -> &[CycleState] {
        &self.path
    }

    /// Move to `next`.  Returns the previous state.
    ///
    /// Edges outside the cycle graph are a programming error; they trip a
    /// debug assertion and are still applied in release builds.
    pub fn advance(&mut self, next: CycleState) -> CycleState {
        let from = self.current;
        debug_assert!(from.can_advance_to(next), "illegal transition {from} -> {next}");
        info!("Cycle: {} -> {}", from, next);
        self.current = next;
        if self.path.push(next).is_err() {
            debug!("Cycle: path log full");
        }
        from
    }
}
