//! Error types shared by the core modules.

use thiserror::Error;
use uuid::Uuid;

/// Failures reported by the platform BLE adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("bluetooth radio is turned off")]
    RadioOff,

    #[error("no bluetooth adapter found")]
    NoAdapter,

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("no active GATT connection")]
    NoActiveConnection,

    #[error("service not found: {0}")]
    ServiceNotFound(Uuid),

    #[error("characteristic not found: {0}")]
    CharacteristicNotFound(Uuid),

    #[error("descriptor not found: {0}")]
    DescriptorNotFound(Uuid),
}

/// Errors raised synchronously to callers of the thermometer API.
///
/// Only contract violations end up here. Missing devices, malformed frames
/// and link loss are reported through return values and events instead.
#[derive(Error, Debug)]
pub enum ThermometerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
