//! Constants used throughout the application
//! This module contains all the constant values used in the application,
//! such as UUIDs, frame markers and timeouts.

use uuid::Uuid;

/// The UUID of the thermometer service
pub const UUID_THERMOMETER_SERVICE: Uuid = Uuid::from_u128(0x0000fe18_0000_1000_8000_00805f9b34fb);

/// The UUID of the thermometer notification characteristic
pub const UUID_THERMOMETER_NOTIFY_CHAR: Uuid =
    Uuid::from_u128(0x0000fe10_0000_1000_8000_00805f9b34fb);

/// The UUID of the thermometer write characteristic
pub const UUID_THERMOMETER_WRITE_CHAR: Uuid =
    Uuid::from_u128(0x0000fe11_0000_1000_8000_00805f9b34fb);

/// Standard Client Characteristic Configuration descriptor
pub const UUID_CLIENT_CONFIG_DESCRIPTOR: Uuid =
    Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/// Client config value enabling notifications
pub const ENABLE_NOTIFICATION_VALUE: [u8; 2] = [0x01, 0x00];

/// Client config value disabling notifications
pub const DISABLE_NOTIFICATION_VALUE: [u8; 2] = [0x00, 0x00];

/// First byte of every command frame
pub const FRAME_START: u8 = 0xF5;

/// Last byte of every command frame
pub const FRAME_END: u8 = 0xFF;

/// Opcode of the read-temperature request
pub const OPCODE_READ_TEMPERATURE: u8 = 0x10;

/// Opcode of the settings command
pub const OPCODE_SETTINGS: u8 = 0x11;

/// Payload length carried by the settings command (mode + unit)
pub const SETTINGS_PAYLOAD_LEN: u8 = 0x02;

/// Minimum length of a response frame we are willing to decode
pub const RESPONSE_MIN_LEN: usize = 12;

/// Offset of the mode byte in a response frame
pub const RESPONSE_MODE_OFFSET: usize = 9;

/// Offset of the unit byte in a response frame
pub const RESPONSE_UNIT_OFFSET: usize = 10;

/// Offset of the temperature in a response frame while in surface mode
pub const RESPONSE_SURFACE_TEMP_OFFSET: usize = 3;

/// Offset of the temperature in a response frame while in body mode
pub const RESPONSE_BODY_TEMP_OFFSET: usize = 5;

/// Advertisement data type carrying the flags field
pub const ADV_TYPE_FLAGS: u8 = 0x01;

/// LE Limited Discoverable Mode | LE General Discoverable Mode
pub const ADV_FLAGS_DISCOVERABLE_MASK: u8 = 0x03;

/// Flag value reported for connectable peripherals (LE General Discoverable)
pub const ADV_FLAG_GENERAL_DISCOVERABLE: u8 = 0x02;

/// Default timeout for a connect attempt in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Scan duration in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// Interval at which the event pump checks for expired connect attempts
pub const TIMEOUT_POLL_INTERVAL_MS: u64 = 250;

/// Interval at which an established link is checked for loss
pub const LINK_POLL_INTERVAL_MS: u64 = 1_000;
