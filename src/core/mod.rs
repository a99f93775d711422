//! Core functionality for the thermometer
//! This module contains the protocol, connection handling and orchestration.

pub mod bluetooth;
pub mod events;
pub mod manager;
pub mod thermometer;

// Re-export commonly used types
pub use events::{EventBus, EventListener, ListenerRef, Topic};
pub use manager::ThermometerManager;
pub use thermometer::{Reading, TemperatureUnit, ThermometerMode};
