//! BLE thermometer library
//! Scans for the thermometer, keeps a GATT connection to it, sends
//! read/unit/mode commands and decodes the readings it reports.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod state;
pub mod utils;

pub use error::{ThermometerError, TransportError};
