//! Bluetooth connection handling for the thermometer
//! This module owns the lifecycle of the single peripheral connection and
//! maps platform events into domain events.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::connection_config::ConnectionConfig;
use crate::core::bluetooth::advertisement;
use crate::core::bluetooth::commands::CommandFrame;
use crate::core::bluetooth::constants::{DISABLE_NOTIFICATION_VALUE, ENABLE_NOTIFICATION_VALUE};
use crate::core::bluetooth::platform::PlatformAdapter;
use crate::core::bluetooth::registry::DeviceRegistry;
use crate::core::bluetooth::types::{
    ConnectionEvent, ConnectionState, DeviceDescriptor, DeviceSighting, PlatformEvent,
};
use crate::error::{ThermometerError, TransportError};

/// Connection manager for the thermometer
///
/// Synchronous: the platform posts events to a queue and whoever drains
/// it feeds them to [`ConnectionManager::handle_event`].
pub struct ConnectionManager<P: PlatformAdapter> {
    platform: P,
    config: ConnectionConfig,
    registry: DeviceRegistry,
    state: ConnectionState,
    radio_enabled: bool,
    /// Address the current GATT handle is bound to
    gatt_address: Option<String>,
    connect_started: Option<Instant>,
    connect_timeout: Option<Duration>,
}

impl<P: PlatformAdapter> ConnectionManager<P> {
    pub fn new(platform: P, config: ConnectionConfig, connect_timeout: Option<Duration>) -> Self {
        let radio_enabled = platform.is_enabled();
        if !radio_enabled {
            warn!("Bluetooth radio is off, connection manager starts inactive");
        }
        Self {
            platform,
            config,
            registry: DeviceRegistry::new(),
            state: ConnectionState::Idle,
            radio_enabled,
            gatt_address: None,
            connect_started: None,
            connect_timeout,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn is_radio_enabled(&self) -> bool {
        self.radio_enabled
    }

    /// Address of the device the GATT handle is bound to
    pub fn gatt_address(&self) -> Option<&str> {
        self.gatt_address.as_deref()
    }

    /// Starts scanning. Bonded devices are reported right away, exactly as
    /// if the scan had just seen them.
    pub fn start_scan(&mut self) -> Vec<ConnectionEvent> {
        if !self.radio_enabled {
            warn!("Cannot scan: bluetooth radio is off");
            return Vec::new();
        }

        let mut events = Vec::new();
        for sighting in self.platform.bonded_devices() {
            if let Some(event) = self.on_device_seen(sighting) {
                events.push(event);
            }
        }

        match self.platform.scan(true) {
            Ok(()) => {
                info!("Device scan started");
                if !self.state.is_linked() {
                    self.state = ConnectionState::Scanning;
                }
            }
            Err(e) => error!("Failed to start scan: {}", e),
        }
        events
    }

    pub fn stop_scan(&mut self) {
        if !self.radio_enabled {
            return;
        }
        if let Err(e) = self.platform.scan(false) {
            warn!("Failed to stop scan: {}", e);
        }
        if self.state == ConnectionState::Scanning {
            self.state = ConnectionState::Idle;
        }
        info!("Device scan stopped");
    }

    /// Initiates a connection. `Ok(true)` means the attempt was started;
    /// the outcome arrives later as a connection-state event.
    pub fn connect(&mut self, address: &str) -> Result<bool, ThermometerError> {
        if address.is_empty() {
            return Err(ThermometerError::InvalidArgument("device address is empty"));
        }
        if !self.radio_enabled {
            warn!("Cannot connect to {}: bluetooth radio is off", address);
            return Ok(false);
        }

        let result = if self.gatt_address.as_deref() == Some(address) {
            debug!("Reusing existing GATT handle for {}", address);
            self.platform.reconnect()
        } else {
            if let Some(previous) = self.gatt_address.take() {
                info!("Releasing GATT handle of {} before connecting to {}", previous, address);
                self.platform.close();
            }
            self.platform.connect(address)
        };

        match result {
            Ok(()) => {
                info!("Initiating connection to {}...", address);
                self.gatt_address = Some(address.to_string());
                self.state = ConnectionState::Connecting;
                self.connect_started = Some(Instant::now());
                Ok(true)
            }
            Err(e) => {
                warn!("Connection attempt to {} failed: {}", address, e);
                Ok(false)
            }
        }
    }

    /// Writes a frame to the write characteristic. Returns false when there
    /// is no usable link; completion is not awaited.
    pub fn send(&mut self, frame: &CommandFrame) -> bool {
        match self.try_send(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping {:?}: {}", frame, e);
                false
            }
        }
    }

    fn try_send(&mut self, frame: &CommandFrame) -> Result<(), TransportError> {
        if !self.radio_enabled {
            return Err(TransportError::RadioOff);
        }
        if self.gatt_address.is_none() {
            return Err(TransportError::NoActiveConnection);
        }
        let service = self.config.service();
        let characteristic = self.config.write_characteristic();
        if !self.platform.has_characteristic(service, characteristic) {
            return Err(TransportError::CharacteristicNotFound(characteristic));
        }
        debug!("Sending command to thermometer: {:?}", frame);
        self.platform.write(service, characteristic, frame.as_bytes())
    }

    /// Drops the link. Safe to call without a connection.
    pub fn disconnect(&mut self) {
        if !self.radio_enabled || self.gatt_address.is_none() {
            return;
        }
        info!("Disconnecting from {:?}", self.gatt_address);
        self.platform.disconnect();
    }

    /// Releases the GATT handle. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.gatt_address.take().is_some() {
            self.platform.close();
        }
        self.connect_started = None;
        self.state = ConnectionState::Idle;
    }

    /// Releases the GATT handle and forgets every discovered device.
    pub fn teardown(&mut self) {
        self.close();
        self.registry.clear();
    }

    /// Maps one platform event onto the state machine.
    pub fn handle_event(&mut self, event: PlatformEvent) -> Option<ConnectionEvent> {
        match event {
            PlatformEvent::DeviceSeen(sighting) => {
                if !self.radio_enabled {
                    return None;
                }
                self.on_device_seen(sighting)
            }
            PlatformEvent::ConnectionStateChanged { address, connected } => {
                self.on_connection_state_changed(address, connected)
            }
            PlatformEvent::ServicesDiscovered { address } => {
                self.on_services_discovered(&address);
                None
            }
            PlatformEvent::CharacteristicChanged {
                characteristic,
                value,
            } => {
                debug!("Received {} bytes on {}", value.len(), characteristic);
                Some(ConnectionEvent::MessageReceived(value))
            }
            PlatformEvent::RadioStateChanged { enabled } => self.on_radio_state_changed(enabled),
        }
    }

    /// Aborts a connect attempt that has been pending for too long.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<ConnectionEvent> {
        let timeout = self.connect_timeout?;
        let started = self.connect_started?;
        if self.state != ConnectionState::Connecting || now.duration_since(started) < timeout {
            return None;
        }

        let address = self.gatt_address.take()?;
        warn!("Connection to {} timed out after {:?}", address, timeout);
        self.platform.close();
        self.connect_started = None;
        self.state = ConnectionState::Disconnected;
        self.registry.remove(&address);
        Some(ConnectionEvent::DeviceStateChanged(DeviceDescriptor::lost(address)))
    }

    fn on_device_seen(&mut self, sighting: DeviceSighting) -> Option<ConnectionEvent> {
        if advertisement::is_broadcast_only(&sighting.scan_record) {
            info!(
                "Device {} is in broadcast mode, hence not displaying",
                sighting.address
            );
            return None;
        }

        let descriptor = DeviceDescriptor::discovered(sighting.address, sighting.name, sighting.rssi);
        if self.registry.upsert(descriptor.clone()) {
            info!(
                "Found device: Address: {}, Name: {:?}, RSSI: {}",
                descriptor.address, descriptor.name, descriptor.rssi
            );
            Some(ConnectionEvent::DeviceStateChanged(descriptor))
        } else {
            None
        }
    }

    fn on_connection_state_changed(
        &mut self,
        address: String,
        connected: bool,
    ) -> Option<ConnectionEvent> {
        debug!("Connection state changed ({}): connected={}", address, connected);
        if connected {
            if self.gatt_address.is_none() {
                debug!("No GATT handle for {}, ignoring connect callback", address);
                return None;
            }
            self.connect_started = None;
            self.state = ConnectionState::Connected;
            info!("Connection successful, discovering services...");
            if let Err(e) = self.platform.discover_services() {
                error!("Failed to start service discovery: {}", e);
            }
            None
        } else {
            if self.gatt_address.as_deref() == Some(address.as_str()) {
                self.connect_started = None;
                self.state = ConnectionState::Disconnected;
            }
            self.registry.remove(&address);
            Some(ConnectionEvent::DeviceStateChanged(DeviceDescriptor::lost(address)))
        }
    }

    fn on_services_discovered(&mut self, address: &str) {
        let service = self.config.service();
        let characteristic = self.config.notify_characteristic();
        if !self.platform.has_characteristic(service, characteristic) {
            error!(
                "Service {} / characteristic {} not found on {}",
                service, characteristic, address
            );
            return;
        }

        match self.enable_notification(true) {
            Ok(()) => {
                info!("Notifications enabled on {}", characteristic);
                self.state = ConnectionState::Notifying;
            }
            Err(e) => error!("Failed to enable notifications: {}", e),
        }
    }

    fn enable_notification(&mut self, enable: bool) -> Result<(), TransportError> {
        let service = self.config.service();
        let characteristic = self.config.notify_characteristic();
        self.platform.subscribe(service, characteristic, enable)?;

        let value = if enable {
            ENABLE_NOTIFICATION_VALUE
        } else {
            DISABLE_NOTIFICATION_VALUE
        };
        self.platform.write_descriptor(
            service,
            characteristic,
            self.config.client_config_descriptor(),
            &value,
        )
    }

    fn on_radio_state_changed(&mut self, enabled: bool) -> Option<ConnectionEvent> {
        if enabled == self.radio_enabled {
            return None;
        }
        if enabled {
            info!("Bluetooth radio turned on, re-initializing transport");
            if let Err(e) = self.platform.reinitialize() {
                error!("Failed to re-initialize transport: {}", e);
                return None;
            }
            self.radio_enabled = true;
            self.state = ConnectionState::Idle;
        } else {
            info!("Bluetooth radio turned off, tearing down connection state");
            self.teardown();
            self.radio_enabled = false;
        }
        Some(ConnectionEvent::RadioStateChanged { enabled })
    }
}
