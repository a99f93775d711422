//! Thermometer data parsing and handling
//! This module decodes response frames received from the thermometer and
//! converts temperatures between unit systems.

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::constants::{
    RESPONSE_BODY_TEMP_OFFSET, RESPONSE_MIN_LEN, RESPONSE_MODE_OFFSET,
    RESPONSE_SURFACE_TEMP_OFFSET, RESPONSE_UNIT_OFFSET,
};

/// Unit the thermometer reports in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Wire value of the unit
    pub fn value(self) -> u8 {
        match self {
            Self::Celsius => 0,
            Self::Fahrenheit => 1,
        }
    }

    /// Anything other than 0 decodes as Fahrenheit.
    pub fn from_byte(value: u8) -> Self {
        if value == 0 { Self::Celsius } else { Self::Fahrenheit }
    }

    pub fn toggled(self) -> Self {
        Self::from_byte((self.value() + 1) % 2)
    }
}

/// Measuring mode of the thermometer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermometerMode {
    Body,
    Surface,
}

impl ThermometerMode {
    /// Wire value of the mode
    pub fn value(self) -> u8 {
        match self {
            Self::Body => 0,
            Self::Surface => 1,
        }
    }

    /// Anything other than 1 decodes as Body.
    pub fn from_byte(value: u8) -> Self {
        if value == 1 { Self::Surface } else { Self::Body }
    }

    pub fn toggled(self) -> Self {
        Self::from_byte((self.value() + 1) % 2)
    }

    /// Offset of the little-endian temperature counts in a response frame
    fn temperature_offset(self) -> usize {
        match self {
            Self::Surface => RESPONSE_SURFACE_TEMP_OFFSET,
            Self::Body => RESPONSE_BODY_TEMP_OFFSET,
        }
    }
}

/// Represents one temperature reading of the thermometer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Temperature in `unit`, one decimal place
    pub temperature: f32,
    pub unit: TemperatureUnit,
    pub mode: ThermometerMode,
}

impl Reading {
    pub fn new(temperature: f32, unit: TemperatureUnit, mode: ThermometerMode) -> Self {
        Self {
            temperature,
            unit,
            mode,
        }
    }
}

impl Default for Reading {
    /// The reading seeded right after a connection attempt is initiated.
    fn default() -> Self {
        Self::new(0.0, TemperatureUnit::Fahrenheit, ThermometerMode::Body)
    }
}

/// Decodes a response frame into a reading.
///
/// Frames shorter than [`RESPONSE_MIN_LEN`] are ignored and `previous` is
/// handed back untouched. The raw counts are Celsius-scaled; when the frame
/// reports Fahrenheit the value is converted on the way out.
pub fn decode_reading(buffer: &[u8], previous: Option<Reading>) -> Option<Reading> {
    if buffer.len() < RESPONSE_MIN_LEN {
        return previous;
    }

    let mode = ThermometerMode::from_byte(buffer[RESPONSE_MODE_OFFSET]);
    let unit = TemperatureUnit::from_byte(buffer[RESPONSE_UNIT_OFFSET]);

    let offset = mode.temperature_offset();
    let counts = u16::from_le_bytes([buffer[offset], buffer[offset + 1]]);
    let celsius = counts as f32 / 10.0;

    let temperature = match unit {
        TemperatureUnit::Fahrenheit => celsius_to_fahrenheit(celsius),
        TemperatureUnit::Celsius => celsius,
    };

    Some(Reading::new(temperature, unit, mode))
}

/// Converts Celsius to Fahrenheit. Non-positive input maps to 0.
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    if celsius <= 0.0 {
        return 0.0;
    }
    round_to(celsius * 1.8 + 32.0, 1)
}

/// Converts Fahrenheit to Celsius. Non-positive input maps to 0.
pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f32 {
    if fahrenheit <= 0.0 {
        return 0.0;
    }
    round_to((fahrenheit - 32.0) / 1.8, 1)
}

/// Rounds half away from zero to `digits` decimal places.
pub fn round_to(value: f32, digits: i32) -> f32 {
    let scale = 10f32.powi(digits);
    (value * scale).round() / scale
}
