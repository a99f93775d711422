//! Bluetooth functionality for the thermometer
//! This module holds the wire codec, the connection state machine and the
//! platform adapters it runs on.

pub mod advertisement;
pub mod bluest_platform;
pub mod commands;
pub mod connection;
pub mod constants;
pub mod mock;
pub mod notification;
pub mod platform;
pub mod registry;
pub mod scanner;
pub mod types;

// Re-export types that should be publicly accessible
pub use bluest_platform::BluestPlatform;
pub use commands::{CommandFrame, ThermometerCommand, encode_settings, read_request_frame};
pub use connection::ConnectionManager;
pub use constants::*;
pub use mock::{MockPlatform, PlatformCall};
pub use platform::PlatformAdapter;
pub use registry::DeviceRegistry;
pub use types::{ConnectionEvent, ConnectionState, DeviceDescriptor, DeviceSighting, PlatformEvent};
