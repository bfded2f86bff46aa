//! Application core: pure domain logic, zero I/O.
//!
//! The wake cycle (rail sequencing, acquisition, delivery, sleep policy)
//! and the bench monitor mode.  All interaction with hardware happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod events;
pub mod monitor;
pub mod ports;
pub mod service;
