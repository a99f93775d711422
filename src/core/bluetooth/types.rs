//! Defines shared data structures for the Bluetooth module.

use std::hash::{Hash, Hasher};

use serde::Serialize;
use uuid::Uuid;

/// Represents a discovered Bluetooth device
///
/// Identity is the address alone: two descriptors with the same address
/// compare equal whatever their other fields say.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDescriptor {
    /// Stable address of the device (MAC address, or platform id where the MAC is hidden)
    pub address: String,
    /// The name of the device, if available
    pub name: Option<String>,
    /// The signal strength (RSSI) of the last sighting
    pub rssi: i16,
    /// False once the platform reported the device as lost
    pub discovered: bool,
}

impl DeviceDescriptor {
    /// Creates a descriptor for a device seen while scanning
    pub fn discovered(address: impl Into<String>, name: Option<String>, rssi: i16) -> Self {
        Self {
            address: address.into(),
            name,
            rssi,
            discovered: true,
        }
    }

    /// Creates the address-only descriptor carried by disconnect events
    pub fn lost(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
            rssi: 0,
            discovered: false,
        }
    }
}

impl PartialEq for DeviceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for DeviceDescriptor {}

impl Hash for DeviceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
    }
}

/// A raw "device seen" report from the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSighting {
    pub address: String,
    pub name: Option<String>,
    pub rssi: i16,
    /// Raw advertisement payload (AD structures); empty for bonded devices
    pub scan_record: Vec<u8>,
}

impl DeviceSighting {
    pub fn new(
        address: impl Into<String>,
        name: Option<String>,
        rssi: i16,
        scan_record: Vec<u8>,
    ) -> Self {
        Self {
            address: address.into(),
            name,
            rssi,
            scan_record,
        }
    }
}

/// Low-level transport events posted by the platform adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    DeviceSeen(DeviceSighting),
    ConnectionStateChanged { address: String, connected: bool },
    ServicesDiscovered { address: String },
    CharacteristicChanged { characteristic: Uuid, value: Vec<u8> },
    RadioStateChanged { enabled: bool },
}

/// Domain events produced by the connection state machine
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A device was discovered (full descriptor) or lost (address only)
    DeviceStateChanged(DeviceDescriptor),
    /// A notification payload arrived on the notify characteristic
    MessageReceived(Vec<u8>),
    /// The radio was switched off or back on
    RadioStateChanged { enabled: bool },
}

/// Lifecycle of the single peripheral connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Idle,
    Scanning,
    Connecting,
    Connected,
    Notifying,
    Disconnected,
}

impl ConnectionState {
    /// True while a link exists or is being established
    pub fn is_linked(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Notifying)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn descriptor_identity_is_the_address() {
        let a = DeviceDescriptor::discovered("AA:BB:CC:DD:EE:FF", Some("Therm".into()), -40);
        let b = DeviceDescriptor::lost("AA:BB:CC:DD:EE:FF");
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn lost_descriptor_carries_only_the_address() {
        let lost = DeviceDescriptor::lost("11:22:33:44:55:66");
        assert!(!lost.discovered);
        assert_eq!(lost.name, None);
        assert_eq!(lost.rssi, 0);
    }
}
