//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable, human-readable device ID in the form `FL-XXYYZZ`
//! (last 3 bytes of the 6-byte MAC in uppercase hex). This ID is:
//! - Deterministic across reboots (factory-burned eFuse MAC)
//! - Used as the control-plane client identifier (bounded to the 23-byte
//!   maximum an MQTT 3.1.1 server must accept)
//! - Printed in the boot banner for fleet correlation

use crate::app::ports::DeviceIdentity;

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

/// Derive the short client identifier from the last 3 MAC bytes.
/// Format: `FL-XXYYZZ` (e.g., `FL-EFCAFE`).
pub fn client_id(mac: &MacAddress) -> heapless::String<23> {
    let mut id = heapless::String::new();
    use core::fmt::Write;
    let _ = write!(id, "FL-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

/// Assemble the device identity from the factory MAC.
pub fn identity() -> DeviceIdentity {
    DeviceIdentity {
        client_id: client_id(&read_mac()),
    }
}
