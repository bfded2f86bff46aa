//! Per-cycle WiFi session with a bounded association wait.
//!
//! A session is created fresh every wake; nothing about the link survives
//! deep sleep.  `connect` never fails: every problem collapses into
//! [`ConnectOutcome::TimedOut`] so the scheduler has a single
//! degrade-to-sleep path.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::{Radio, WakeClock};
use crate::config::WifiConfig;

/// Interval between association polls.
pub const POLL_INTERVAL_MS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Ready,
    TimedOut,
}

pub struct NetworkSession<'a, R: Radio> {
    radio: &'a mut R,
    config: &'a WifiConfig,
    state: NetworkState,
}

impl<'a, R: Radio> NetworkSession<'a, R> {
    pub fn new(radio: &'a mut R, config: &'a WifiConfig) -> Self {
        Self {
            radio,
            config,
            state: NetworkState::Disconnected,
        }
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    /// Bring the station up and wait at most `timeout_ms` for association.
    ///
    /// Elapsed time is measured on `clock` from the moment the radio is
    /// activated; the wait ends on the first poll past the deadline.
    pub fn connect(
        &mut self,
        timeout_ms: u32,
        clock: &impl WakeClock,
        delay: &mut impl DelayNs,
    ) -> ConnectOutcome {
        let start = clock.millis_since_wake();
        self.radio.set_active(true);

        if let Some(ip) = &self.config.static_ip {
            match self.radio.apply_static_ip(ip) {
                Ok(()) => info!(
                    "WiFi: static {}.{}.{}.{}/{}",
                    ip.addr[0],
                    ip.addr[1],
                    ip.addr[2],
                    ip.addr[3],
                    ip.prefix_len()
                ),
                Err(e) => warn!("WiFi: static address rejected ({}), using DHCP", e),
            }
        }

        if let Err(e) = self
            .radio
            .begin_connect(self.config.ssid.as_str(), self.config.psk.as_str())
        {
            warn!("WiFi: {}", e);
            self.state = NetworkState::Failed;
            return ConnectOutcome::TimedOut;
        }
        self.state = NetworkState::Connecting;
        info!("WiFi: connecting to '{}'", self.config.ssid);

        loop {
            if self.radio.is_associated() {
                self.state = NetworkState::Connected;
                info!("WiFi: connected after {} ms", clock.millis_since_wake() - start);
                return ConnectOutcome::Ready;
            }
            let elapsed = clock.millis_since_wake().saturating_sub(start);
            if elapsed > u64::from(timeout_ms) {
                self.state = NetworkState::Failed;
                warn!("WiFi: no association within {} ms", timeout_ms);
                return ConnectOutcome::TimedOut;
            }
            delay.delay_ms(POLL_INTERVAL_MS);
        }
    }

    /// Deactivate the radio.  Safe to call in any state.
    pub fn close(&mut self) {
        self.radio.set_active(false);
        self.state = NetworkState::Disconnected;
    }
}
