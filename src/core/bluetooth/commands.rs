//! Thermometer commands implementation
//! This module contains the command frames that can be sent to the thermometer

use std::fmt;

use crate::core::bluetooth::constants::{
    FRAME_END, FRAME_START, OPCODE_READ_TEMPERATURE, OPCODE_SETTINGS, SETTINGS_PAYLOAD_LEN,
};
use crate::core::thermometer::{TemperatureUnit, ThermometerMode};

/// Thermometer commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermometerCommand {
    /// Request a temperature reading (F5 10 00 00 FF)
    ReadTemperature,
    /// Apply unit and mode (F5 11 02 <mode> <unit> <mode ^ unit> FF)
    Settings {
        unit: TemperatureUnit,
        mode: ThermometerMode,
    },
}

impl ThermometerCommand {
    /// Convert the command to its wire frame
    pub fn frame(&self) -> CommandFrame {
        match *self {
            Self::ReadTemperature => read_request_frame(),
            Self::Settings { unit, mode } => encode_settings(unit, mode),
        }
    }
}

/// A fixed-layout frame ready to be written to the write characteristic.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandFrame {
    bytes: Vec<u8>,
}

impl CommandFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandFrame[")?;
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        write!(f, "]")
    }
}

/// Builds the settings frame. The checksum is `mode ^ unit`.
pub fn encode_settings(unit: TemperatureUnit, mode: ThermometerMode) -> CommandFrame {
    let mode_byte = mode.value();
    let unit_byte = unit.value();
    CommandFrame {
        bytes: vec![
            FRAME_START,
            OPCODE_SETTINGS,
            SETTINGS_PAYLOAD_LEN,
            mode_byte,
            unit_byte,
            mode_byte ^ unit_byte,
            FRAME_END,
        ],
    }
}

/// The constant read-temperature request.
pub fn read_request_frame() -> CommandFrame {
    CommandFrame {
        bytes: vec![FRAME_START, OPCODE_READ_TEMPERATURE, 0x00, 0x00, FRAME_END],
    }
}
