//! MQTT delivery adapter.
//!
//! Implements [`DeliveryTransport`] on top of the ESP-IDF MQTT client.
//! The client is created per cycle; broker events arrive on the client's
//! own task and are mirrored into atomics that the cycle task polls with a
//! deadline, so neither connect nor the QoS 1 acknowledgement can stall
//! the wake.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::mqtt::client::EspMqttClient`.
//! - **all other targets**: in-memory broker stub for host-side tests.

use core::fmt::Write as _;

use log::{debug, info};
#[cfg(target_os = "espidf")]
use log::warn;

use crate::app::ports::DeliveryTransport;
use crate::config::{MqttConfig, Qos};
use crate::error::DeliveryError;

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
#[cfg(target_os = "espidf")]
use std::sync::Arc;

#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    hal::delay::FreeRtos,
    mqtt::client::{EventPayload, EspMqttClient, MqttClientConfiguration, QoS},
};

/// Interval between broker-state polls.
#[cfg(target_os = "espidf")]
const POLL_MS: u32 = 20;

/// `mqtt://host:port`
pub fn broker_url(host: &str, port: u16) -> heapless::String<96> {
    let mut url = heapless::String::new();
    let _ = write!(url, "mqtt://{}:{}", host, port);
    url
}

#[cfg(target_os = "espidf")]
fn to_esp_qos(qos: Qos) -> QoS {
    match qos {
        Qos::AtMostOnce => QoS::AtMostOnce,
        Qos::AtLeastOnce => QoS::AtLeastOnce,
        Qos::ExactlyOnce => QoS::ExactlyOnce,
    }
}

/// Broker state shared with the client's event task.
#[cfg(target_os = "espidf")]
#[derive(Default)]
struct LinkFlags {
    connected: AtomicBool,
    /// Message id of the last broker acknowledgement (0 = none).
    acked: AtomicU32,
}

/// Poll `done` every [`POLL_MS`] until it holds or `timeout_ms` passes.
#[cfg(target_os = "espidf")]
fn wait_until(timeout_ms: u32, done: impl Fn() -> bool) -> bool {
    let mut waited = 0;
    while !done() {
        if waited >= timeout_ms {
            return false;
        }
        FreeRtos::delay_ms(POLL_MS);
        waited += POLL_MS;
    }
    true
}

// ───────────────────────────────────────────────────────────────
// Transport
// ───────────────────────────────────────────────────────────────

pub struct MqttTransport {
    url: heapless::String<96>,
    client_id: heapless::String<32>,
    user: heapless::String<32>,
    password: heapless::String<64>,
    keepalive_secs: u16,
    /// Wait for the broker acknowledgement of a QoS ≥ 1 publish.
    ack_timeout_ms: u32,
    #[cfg(target_os = "espidf")]
    client: Option<EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    link: Arc<LinkFlags>,
    /// Simulation: whether the broker accepts connections.
    #[cfg(not(target_os = "espidf"))]
    sim_reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_connected: bool,
    /// Simulation: every accepted publish, in order.
    #[cfg(not(target_os = "espidf"))]
    sim_published: Vec<(heapless::String<64>, Vec<u8>)>,
}

impl MqttTransport {
    /// `client_id` overrides an empty `config.client_id`.
    pub fn new(config: &MqttConfig, client_id: &str) -> Self {
        let client_id = if config.client_id.is_empty() {
            crate::config::truncated(client_id)
        } else {
            config.client_id.clone()
        };
        Self {
            url: broker_url(&config.host, config.port),
            client_id,
            user: config.user.clone(),
            password: config.password.clone(),
            keepalive_secs: config.keepalive_secs,
            ack_timeout_ms: config.connect_timeout_ms,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            link: Arc::new(LinkFlags::default()),
            #[cfg(not(target_os = "espidf"))]
            sim_reachable: true,
            #[cfg(not(target_os = "espidf"))]
            sim_connected: false,
            #[cfg(not(target_os = "espidf"))]
            sim_published: Vec::new(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Simulation: make the broker refuse connections.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_reachable(&mut self, reachable: bool) {
        self.sim_reachable = reachable;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[(heapless::String<64>, Vec<u8>)] {
        &self.sim_published
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, timeout_ms: u32) -> Result<(), DeliveryError> {
        let link = Arc::new(LinkFlags::default());
        let events = Arc::clone(&link);
        let conf = MqttClientConfiguration {
            client_id: Some(self.client_id.as_str()),
            username: (!self.user.is_empty()).then_some(self.user.as_str()),
            password: (!self.password.is_empty()).then_some(self.password.as_str()),
            keep_alive_interval: Some(core::time::Duration::from_secs(u64::from(self.keepalive_secs))),
            ..Default::default()
        };

        let client = EspMqttClient::new_cb(self.url.as_str(), &conf, move |event| match event.payload() {
            EventPayload::Connected(_) => events.connected.store(true, Ordering::Release),
            EventPayload::Disconnected => events.connected.store(false, Ordering::Release),
            EventPayload::Published(id) => events.acked.store(id, Ordering::Release),
            _ => {}
        })
        .map_err(|e| {
            warn!("MQTT: client init failed: {}", e);
            DeliveryError::ConnectFailed
        })?;
        self.client = Some(client);
        self.link = link;

        let link = Arc::clone(&self.link);
        if !wait_until(timeout_ms, || link.connected.load(Ordering::Acquire)) {
            self.client = None;
            return Err(DeliveryError::ConnectFailed);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, _timeout_ms: u32) -> Result<(), DeliveryError> {
        if !self.sim_reachable {
            return Err(DeliveryError::ConnectFailed);
        }
        self.sim_connected = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), DeliveryError> {
        let client = self.client.as_mut().ok_or(DeliveryError::PublishFailed)?;
        let id = client
            .publish(topic, to_esp_qos(qos), false, payload)
            .map_err(|e| {
                warn!("MQTT: publish rejected: {}", e);
                DeliveryError::PublishFailed
            })?;
        if qos == Qos::AtMostOnce {
            return Ok(());
        }
        let link = Arc::clone(&self.link);
        if wait_until(self.ack_timeout_ms, || link.acked.load(Ordering::Acquire) == id) {
            Ok(())
        } else {
            Err(DeliveryError::PublishFailed)
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_publish(&mut self, topic: &str, payload: &[u8], _qos: Qos) -> Result<(), DeliveryError> {
        if !self.sim_connected {
            return Err(DeliveryError::PublishFailed);
        }
        self.sim_published
            .push((crate::config::truncated(topic), payload.to_vec()));
        Ok(())
    }
}

impl DeliveryTransport for MqttTransport {
    fn connect(&mut self, timeout_ms: u32) -> Result<(), DeliveryError> {
        info!("MQTT: connecting to {} as '{}'", self.url, self.client_id);
        self.platform_connect(timeout_ms)?;
        debug!("MQTT: connected");
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), DeliveryError> {
        debug!("MQTT: {} bytes to '{}' ({:?})", payload.len(), topic, qos);
        self.platform_publish(topic, payload, qos)
    }
}
