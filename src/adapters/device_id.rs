//! Device identity derived from the ESP32 factory MAC address.
//!
//! The MQTT client id defaults to `shuntmeter-xxyyzz` (last 3 bytes of the
//! factory MAC, lowercase hex): stable across reboots and unique per board,
//! so two nodes on one broker never kick each other off.

use core::fmt::Write;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// MQTT client id: `shuntmeter-xxyyzz`.
pub fn client_id(mac: &MacAddress) -> heapless::String<32> {
    let mut id = heapless::String::new();
    let _ = write!(id, "shuntmeter-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}
