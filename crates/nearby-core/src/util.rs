//! Utility functions for nearby-core.
//!
//! This module contains helpers for turning platform peripheral ids into
//! transport handles and identity keys.

use btleplug::platform::PeripheralId;
use uuid::Uuid;

use nearby_types::TransportId;
use nearby_types::uuid::PROXIMITY_SERVICE;

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms, they may be
/// MAC addresses or other formats. This function extracts the useful
/// identifier string.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Create a transport id from an address and peripheral ID.
///
/// On macOS where addresses are 00:00:00:00:00:00, uses the peripheral ID.
/// On other platforms, uses the Bluetooth address.
pub fn create_transport_id(address: &str, peripheral_id: &PeripheralId) -> TransportId {
    if address == "00:00:00:00:00:00" {
        TransportId::new(format_peripheral_id(peripheral_id))
    } else {
        TransportId::new(address)
    }
}

/// Derive a stable identity key from a transport id.
///
/// A transport id that already is a UUID (CoreBluetooth) is used verbatim.
/// Anything else (a MAC address) becomes a name-based v5 UUID in the
/// proximity service namespace, so the same peripheral always maps to the
/// same key.
pub fn identity_for_transport(id: &TransportId) -> Uuid {
    if let Ok(uuid) = Uuid::parse_str(id.as_str()) {
        return uuid;
    }
    Uuid::new_v5(&PROXIMITY_SERVICE, id.as_str().to_ascii_uppercase().as_bytes())
}
