use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    UUID_CLIENT_CONFIG_DESCRIPTOR, UUID_THERMOMETER_NOTIFY_CHAR, UUID_THERMOMETER_SERVICE,
    UUID_THERMOMETER_WRITE_CHAR,
};

/// GATT layout of the peripheral. Two configs are equal when all four ids are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Service holding both characteristics
    service: Uuid,
    /// Readable / notifiable characteristic carrying response frames
    notify_characteristic: Uuid,
    /// Characteristic command frames are written to
    write_characteristic: Uuid,
    /// Client-config descriptor of the notify characteristic
    client_config_descriptor: Uuid,
}

impl ConnectionConfig {
    pub fn new(
        service: Uuid,
        notify_characteristic: Uuid,
        write_characteristic: Uuid,
        client_config_descriptor: Uuid,
    ) -> Self {
        Self {
            service,
            notify_characteristic,
            write_characteristic,
            client_config_descriptor,
        }
    }

    pub fn service(&self) -> Uuid {
        self.service
    }

    pub fn notify_characteristic(&self) -> Uuid {
        self.notify_characteristic
    }

    pub fn write_characteristic(&self) -> Uuid {
        self.write_characteristic
    }

    pub fn client_config_descriptor(&self) -> Uuid {
        self.client_config_descriptor
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(
            UUID_THERMOMETER_SERVICE,
            UUID_THERMOMETER_NOTIFY_CHAR,
            UUID_THERMOMETER_WRITE_CHAR,
            UUID_CLIENT_CONFIG_DESCRIPTOR,
        )
    }
}
