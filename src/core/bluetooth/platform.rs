//! Narrow interface to the platform BLE stack.
//!
//! Every operation is fire-and-forget: a returned `Ok` only means the
//! request was issued. Outcomes (device seen, link up/down, services
//! discovered, notifications) come back later as
//! [`PlatformEvent`](crate::core::bluetooth::PlatformEvent)s through the
//! queue the adapter was built with.

use uuid::Uuid;

use crate::core::bluetooth::types::DeviceSighting;
use crate::error::TransportError;

/// Platform adapter trait
pub trait PlatformAdapter: Send {
    /// Whether the radio is on
    fn is_enabled(&self) -> bool;

    /// Devices already bonded/paired with the adapter
    fn bonded_devices(&mut self) -> Vec<DeviceSighting>;

    /// Start or stop LE scanning
    fn scan(&mut self, start: bool) -> Result<(), TransportError>;

    /// Obtain a fresh GATT handle for `address` and start connecting
    fn connect(&mut self, address: &str) -> Result<(), TransportError>;

    /// Ask the existing GATT handle to connect again
    fn reconnect(&mut self) -> Result<(), TransportError>;

    /// Start service discovery on the connected handle
    fn discover_services(&mut self) -> Result<(), TransportError>;

    /// Whether discovery found `characteristic` inside `service`
    fn has_characteristic(&self, service: Uuid, characteristic: Uuid) -> bool;

    /// Enable or disable local delivery of notifications
    fn subscribe(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        enable: bool,
    ) -> Result<(), TransportError>;

    /// Write a descriptor value (typically the client-config descriptor)
    fn write_descriptor(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Write a characteristic value without waiting for completion
    fn write(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Drop the link, keeping the GATT handle for a later reconnect
    fn disconnect(&mut self);

    /// Release the GATT handle
    fn close(&mut self);

    /// Rebuild the transport binding after the radio came back on
    fn reinitialize(&mut self) -> Result<(), TransportError>;
}
