//! WiFi station-mode adapter.
//!
//! Implements [`Radio`], the hexagonal boundary for the link layer.  The
//! adapter only starts association; the bounded wait lives in
//! [`NetworkSession`](crate::network::NetworkSession), which polls
//! [`Radio::is_associated`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.

use log::{info, warn};

use crate::app::ports::{Radio, RadioError};
use crate::config::StaticIp;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    ipv4::{
        ClientConfiguration as IpClientConfiguration, ClientSettings as IpClientSettings,
        Configuration as IpConfiguration, Ipv4Addr, Mask, Subnet,
    },
    netif::{EspNetif, NetifConfiguration},
    wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiRadio {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    /// Simulation: polls before the link reports up (`None` = never).
    #[cfg(not(target_os = "espidf"))]
    sim_polls_until_up: Option<u32>,
    #[cfg(not(target_os = "espidf"))]
    sim_polls: u32,
    active: bool,
}

impl WifiRadio {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self { wifi, active: false }
    }

    /// Simulation radio that associates after `polls_until_up` polls.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(polls_until_up: Option<u32>) -> Self {
        Self {
            sim_polls_until_up: polls_until_up,
            sim_polls: 0,
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_set_active(&mut self, active: bool) {
        let res = if active { self.wifi.start() } else { self.wifi.stop() };
        if let Err(e) = res {
            warn!("WiFi: {} failed: {}", if active { "start" } else { "stop" }, e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_set_active(&mut self, active: bool) {
        if active {
            self.sim_polls = 0;
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_static_ip(&mut self, ip: &StaticIp) -> Result<(), RadioError> {
        let mask = Mask::try_from(Ipv4Addr::from(ip.mask)).map_err(|_| RadioError::Config)?;
        let conf = NetifConfiguration {
            ip_configuration: Some(IpConfiguration::Client(IpClientConfiguration::Fixed(
                IpClientSettings {
                    ip: Ipv4Addr::from(ip.addr),
                    subnet: Subnet {
                        gateway: Ipv4Addr::from(ip.gateway),
                        mask,
                    },
                    dns: Some(Ipv4Addr::from(ip.dns)),
                    secondary_dns: None,
                },
            ))),
            ..NetifConfiguration::wifi_default_client()
        };
        let netif = EspNetif::new_with_conf(&conf).map_err(|_| RadioError::Config)?;
        self.wifi
            .swap_netif_sta(netif)
            .map(|_| ())
            .map_err(|_| RadioError::Config)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_static_ip(&mut self, ip: &StaticIp) -> Result<(), RadioError> {
        if ip.prefix_len() == 0 {
            return Err(RadioError::Config);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_begin(&mut self, ssid: &str, psk: &str) -> Result<(), RadioError> {
        let auth_method = if psk.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let conf = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| RadioError::Config)?,
            password: psk.try_into().map_err(|_| RadioError::Config)?,
            auth_method,
            ..Default::default()
        });
        self.wifi.set_configuration(&conf).map_err(|_| RadioError::Config)?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|_| RadioError::Start)?;
        }
        self.wifi.connect().map_err(|_| RadioError::Start)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin(&mut self, ssid: &str, _psk: &str) -> Result<(), RadioError> {
        if ssid.is_empty() {
            return Err(RadioError::Config);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_up(&mut self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.sta_netif().is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_up(&mut self) -> bool {
        self.sim_polls += 1;
        self.sim_polls_until_up.is_some_and(|n| self.sim_polls > n)
    }
}

impl Radio for WifiRadio {
    fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }
        self.platform_set_active(active);
        self.active = active;
        info!("WiFi: radio {}", if active { "on" } else { "off" });
    }

    fn apply_static_ip(&mut self, ip: &StaticIp) -> Result<(), RadioError> {
        self.platform_static_ip(ip)
    }

    fn begin_connect(&mut self, ssid: &str, psk: &str) -> Result<(), RadioError> {
        if !self.active {
            warn!("WiFi: connect requested with radio off");
            return Err(RadioError::Start);
        }
        self.platform_begin(ssid, psk)
    }

    fn is_associated(&mut self) -> bool {
        self.active && self.platform_is_up()
    }
}
