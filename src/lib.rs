//! Shuntmeter firmware library.
//!
//! Exposes the pure-logic modules for integration testing and the firmware
//! binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module, with simulation stubs
//! on the host.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod delivery;
pub mod error;
pub mod fsm;
pub mod network;
pub mod pins;
pub mod power;
pub mod sensors;

pub mod adapters;
pub mod drivers;
