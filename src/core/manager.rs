//! Thermometer manager
//! This module owns the current device and the current reading, exposes
//! the user-facing operations and turns connection events into bus events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::config::connection_config::ConnectionConfig;
use crate::core::bluetooth::commands::{ThermometerCommand, encode_settings};
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::constants::RESPONSE_MIN_LEN;
use crate::core::bluetooth::platform::PlatformAdapter;
use crate::core::bluetooth::types::{
    ConnectionEvent, ConnectionState, DeviceDescriptor, PlatformEvent,
};
use crate::core::events::{EventBus, ListenerRef};
use crate::core::thermometer::{
    Reading, TemperatureUnit, celsius_to_fahrenheit, decode_reading, fahrenheit_to_celsius,
};
use crate::error::ThermometerError;

struct ManagerState<P: PlatformAdapter> {
    /// `None` once the manager has been closed
    connection: Option<ConnectionManager<P>>,
    current_device: Option<DeviceDescriptor>,
    reading: Option<Reading>,
    connect_timeout: Option<Duration>,
}

/// Bus payload produced under the state lock, published after it is released
enum Broadcast {
    Reading(Reading),
    Device(DeviceDescriptor),
}

struct Shared<P: PlatformAdapter> {
    state: Mutex<ManagerState<P>>,
    bus: EventBus,
}

/// Manages the thermometer connection and readings
///
/// All mutable state sits behind one lock, shared by foreground calls and
/// the platform event pump. Cloning yields another handle to the same
/// manager.
pub struct ThermometerManager<P: PlatformAdapter> {
    shared: Arc<Shared<P>>,
}

impl<P: PlatformAdapter> Clone for ThermometerManager<P> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<P: PlatformAdapter + 'static> ThermometerManager<P> {
    /// Creates a new ThermometerManager
    pub fn new(
        platform: P,
        config: ConnectionConfig,
        connect_timeout: Option<Duration>,
        bus: EventBus,
    ) -> Self {
        let connection = ConnectionManager::new(platform, config, connect_timeout);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(ManagerState {
                    connection: Some(connection),
                    current_device: None,
                    reading: None,
                    connect_timeout,
                }),
                bus,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState<P>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    /// Rebuilds the connection manager when `config` differs from the one in
    /// use; otherwise keeps the existing one and drops `platform`.
    /// Returns true when a rebuild happened.
    pub fn rebind(&self, config: ConnectionConfig, platform: P) -> bool {
        let mut state = self.lock();
        if let Some(connection) = state.connection.as_ref() {
            if *connection.config() == config {
                debug!("Connection config unchanged, reusing connection manager");
                return false;
            }
        }

        info!("Connection config changed, rebuilding connection manager");
        if let Some(mut old) = state.connection.take() {
            old.teardown();
        }
        state.current_device = None;
        state.reading = None;
        state.connection = Some(ConnectionManager::new(platform, config, state.connect_timeout));
        true
    }

    /// Starts scanning for devices
    pub fn start_scan(&self) {
        let broadcasts = {
            let mut state = self.lock();
            let Some(connection) = state.connection.as_mut() else {
                return;
            };
            let events = connection.start_scan();
            let mut broadcasts = Vec::new();
            for event in events {
                broadcasts.extend(Self::apply(&mut state, event, Vec::new()));
            }
            broadcasts
        };
        self.broadcast(broadcasts);
    }

    /// Stops scanning for devices
    pub fn stop_scan(&self) {
        if let Some(connection) = self.lock().connection.as_mut() {
            connection.stop_scan();
        }
    }

    /// Currently known devices, in discovery order
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.lock()
            .connection
            .as_ref()
            .map(|connection| connection.registry().list())
            .unwrap_or_default()
    }

    /// Looks up a known device by address
    pub fn device(&self, address: &str) -> Option<DeviceDescriptor> {
        self.lock()
            .connection
            .as_ref()
            .and_then(|connection| connection.registry().get(address).cloned())
    }

    pub fn current_device(&self) -> Option<DeviceDescriptor> {
        self.lock().current_device.clone()
    }

    pub fn current_reading(&self) -> Option<Reading> {
        self.lock().reading
    }

    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.lock().connection.as_ref().map(|connection| connection.state())
    }

    pub fn is_closed(&self) -> bool {
        self.lock().connection.is_none()
    }

    /// False while the radio is off and once the manager has been closed
    pub fn is_radio_enabled(&self) -> bool {
        self.lock()
            .connection
            .as_ref()
            .is_some_and(|connection| connection.is_radio_enabled())
    }

    /// Connects to the given device. Returns whether the attempt was
    /// initiated, not whether it succeeded.
    pub fn connect_thermometer(
        &self,
        descriptor: Option<&DeviceDescriptor>,
    ) -> Result<bool, ThermometerError> {
        let descriptor = descriptor.ok_or(ThermometerError::InvalidArgument(
            "device descriptor is required to connect",
        ))?;

        let mut state = self.lock();
        let Some(connection) = state.connection.as_mut() else {
            warn!("Thermometer manager is closed, ignoring connect request");
            return Ok(false);
        };

        if !connection.connect(&descriptor.address)? {
            return Ok(false);
        }
        state.reading = Some(Reading::default());
        state.current_device = Some(descriptor.clone());
        info!("Connecting to thermometer {}", descriptor.address);
        Ok(true)
    }

    /// Asks the thermometer for a reading. Returns whether the request was sent.
    pub fn read_temperature(&self) -> bool {
        let mut state = self.lock();
        if state.current_device.is_none() {
            return false;
        }
        let Some(connection) = state.connection.as_mut() else {
            return false;
        };
        connection.send(&ThermometerCommand::ReadTemperature.frame())
    }

    /// Switches between Celsius and Fahrenheit. Returns whether the settings
    /// frame was transmitted.
    pub fn change_unit(&self) -> bool {
        let mut state = self.lock();
        let ManagerState {
            connection,
            current_device,
            reading,
            ..
        } = &mut *state;
        let (Some(connection), Some(_), Some(reading)) =
            (connection.as_mut(), current_device.as_ref(), reading.as_mut())
        else {
            return false;
        };

        let unit = reading.unit.toggled();
        reading.temperature = match unit {
            TemperatureUnit::Fahrenheit => celsius_to_fahrenheit(reading.temperature),
            TemperatureUnit::Celsius => fahrenheit_to_celsius(reading.temperature),
        };
        reading.unit = unit;

        info!("Changing unit to {:?}", unit);
        connection.send(&encode_settings(unit, reading.mode))
    }

    /// Switches between body and surface mode. Returns whether the settings
    /// frame was transmitted.
    pub fn change_mode(&self) -> bool {
        let mut state = self.lock();
        let ManagerState {
            connection,
            current_device,
            reading,
            ..
        } = &mut *state;
        let (Some(connection), Some(_), Some(reading)) =
            (connection.as_mut(), current_device.as_ref(), reading.as_mut())
        else {
            return false;
        };

        let mode = reading.mode.toggled();
        reading.mode = mode;

        info!("Changing mode to {:?}", mode);
        connection.send(&encode_settings(reading.unit, mode))
    }

    /// Disconnects from the current device
    pub fn disconnect(&self) {
        let mut state = self.lock();
        if state.current_device.take().is_none() {
            return;
        }
        state.reading = None;
        if let Some(connection) = state.connection.as_mut() {
            connection.disconnect();
        }
    }

    /// Releases the connection, the registry and the reading. Every later
    /// operation is a no-op; build a new manager to start over.
    pub fn close(&self) {
        let mut state = self.lock();
        if let Some(mut connection) = state.connection.take() {
            connection.teardown();
            info!("Thermometer manager closed");
        }
        state.current_device = None;
        state.reading = None;
    }

    /// Feeds one platform event through the connection state machine.
    pub fn handle_platform_event(&self, event: PlatformEvent) {
        let radio_off = matches!(event, PlatformEvent::RadioStateChanged { enabled: false });
        let broadcasts = {
            let mut state = self.lock();
            let Some(connection) = state.connection.as_mut() else {
                return;
            };
            // Radio-off empties the registry
            let known = if radio_off {
                connection.registry().list()
            } else {
                Vec::new()
            };
            match connection.handle_event(event) {
                Some(event) => Self::apply(&mut state, event, known),
                None => Vec::new(),
            }
        };
        self.broadcast(broadcasts);
    }

    /// Aborts an expired connect attempt.
    pub fn poll_timeouts(&self, now: Instant) {
        let broadcasts = {
            let mut state = self.lock();
            let Some(connection) = state.connection.as_mut() else {
                return;
            };
            match connection.poll_timeout(now) {
                Some(event) => Self::apply(&mut state, event, Vec::new()),
                None => Vec::new(),
            }
        };
        self.broadcast(broadcasts);
    }

    /// Folds a connection event into the manager state. Runs under the same
    /// guard as the state machine call that produced `event`.
    fn apply(
        state: &mut ManagerState<P>,
        event: ConnectionEvent,
        known: Vec<DeviceDescriptor>,
    ) -> Vec<Broadcast> {
        match event {
            ConnectionEvent::MessageReceived(message) => {
                if message.len() < RESPONSE_MIN_LEN {
                    debug!("Ignoring {} byte frame", message.len());
                    return Vec::new();
                }
                state.reading = decode_reading(&message, state.reading);
                state
                    .reading
                    .map(|reading| {
                        debug!("Decoded reading: {:?}", reading);
                        Broadcast::Reading(reading)
                    })
                    .into_iter()
                    .collect()
            }
            ConnectionEvent::DeviceStateChanged(descriptor) => {
                if !descriptor.discovered && state.current_device.as_ref() == Some(&descriptor) {
                    info!("Current thermometer {} disconnected", descriptor.address);
                    state.current_device = None;
                    state.reading = None;
                }
                vec![Broadcast::Device(descriptor)]
            }
            ConnectionEvent::RadioStateChanged { enabled } => {
                info!("Bluetooth radio is now {}", if enabled { "on" } else { "off" });
                if enabled {
                    return Vec::new();
                }
                let mut addresses: Vec<String> =
                    known.into_iter().map(|device| device.address).collect();
                if let Some(device) = state.current_device.take() {
                    if !addresses.contains(&device.address) {
                        addresses.push(device.address);
                    }
                }
                state.reading = None;
                addresses
                    .into_iter()
                    .map(|address| Broadcast::Device(DeviceDescriptor::lost(address)))
                    .collect()
            }
        }
    }

    fn broadcast(&self, broadcasts: Vec<Broadcast>) {
        for broadcast in broadcasts {
            match broadcast {
                Broadcast::Reading(reading) => self.shared.bus.reading_received.publish(reading),
                Broadcast::Device(descriptor) => {
                    self.shared.bus.device_state_changed.publish(descriptor)
                }
            }
        }
    }

    /// Connects to every device published on the device-selected topic.
    pub fn listen_for_selection(&self) -> ListenerRef<DeviceDescriptor> {
        let weak: Weak<Shared<P>> = Arc::downgrade(&self.shared);
        let listener: ListenerRef<DeviceDescriptor> = Arc::new(move |device: &DeviceDescriptor| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let manager = ThermometerManager { shared };
            if let Err(e) = manager.connect_thermometer(Some(device)) {
                error!("Failed to connect to selected device: {}", e);
            }
        });
        self.shared.bus.device_selected.register(&listener);
        listener
    }

    /// Drains platform events until the sender side is dropped, checking
    /// connect timeouts every `tick`.
    pub async fn run_event_pump(self, mut events: mpsc::UnboundedReceiver<PlatformEvent>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("Listening for platform events...");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_platform_event(event),
                    None => break,
                },
                _ = interval.tick() => self.poll_timeouts(Instant::now()),
            }
        }
        info!("Platform event stream ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::advertisement::flags_record;
    use crate::core::bluetooth::commands::read_request_frame;
    use crate::core::bluetooth::mock::{MockPlatform, PlatformCall};
    use crate::core::bluetooth::types::DeviceSighting;
    use crate::core::thermometer::ThermometerMode;

    const ADDRESS: &str = "AA:BB:CC:DD:EE:FF";
    const RESPONSE: [u8; 13] = [
        0xFA, 0x10, 0x08, 0x23, 0x01, 0x28, 0x01, 0x06, 0x01, 0x00, 0x01, 0x56, 0xFF,
    ];

    fn manager() -> (ThermometerManager<MockPlatform>, MockPlatform) {
        let config = ConnectionConfig::default();
        let platform = MockPlatform::with_gatt(&config);
        let bus = EventBus::new().unwrap();
        let manager = ThermometerManager::new(platform.clone(), config, None, bus);
        (manager, platform)
    }

    fn device() -> DeviceDescriptor {
        DeviceDescriptor::discovered(ADDRESS, Some("Thermometer".into()), -55)
    }

    fn connect(manager: &ThermometerManager<MockPlatform>) {
        assert!(manager.connect_thermometer(Some(&device())).unwrap());
        manager.handle_platform_event(PlatformEvent::ConnectionStateChanged {
            address: ADDRESS.into(),
            connected: true,
        });
        manager.handle_platform_event(PlatformEvent::ServicesDiscovered {
            address: ADDRESS.into(),
        });
    }

    fn readings(manager: &ThermometerManager<MockPlatform>) -> Arc<Mutex<Vec<Reading>>> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let listener: ListenerRef<Reading> =
            Arc::new(move |reading: &Reading| sink.lock().unwrap().push(*reading));
        manager.bus().reading_received.register(&listener);
        received
    }

    #[test]
    fn connect_without_descriptor_is_invalid() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.connect_thermometer(None),
            Err(ThermometerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn connect_seeds_default_reading() {
        let (manager, _) = manager();
        assert_eq!(manager.current_reading(), None);
        assert!(manager.connect_thermometer(Some(&device())).unwrap());
        assert_eq!(manager.current_reading(), Some(Reading::default()));
        assert_eq!(manager.current_device(), Some(device()));
    }

    #[test]
    fn failed_initiation_records_nothing() {
        let (manager, platform) = manager();
        platform.set_fail_connect(true);
        assert!(!manager.connect_thermometer(Some(&device())).unwrap());
        assert_eq!(manager.current_device(), None);
        assert_eq!(manager.current_reading(), None);
    }

    #[test]
    fn operations_without_device_are_noops() {
        let (manager, platform) = manager();
        assert!(!manager.read_temperature());
        assert!(!manager.change_unit());
        assert!(!manager.change_mode());
        manager.disconnect();
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn read_temperature_sends_read_request() {
        let (manager, platform) = manager();
        connect(&manager);
        assert!(manager.read_temperature());
        assert_eq!(platform.writes(), vec![read_request_frame().as_bytes().to_vec()]);
    }

    #[test]
    fn change_unit_toggles_and_converts() {
        let (manager, platform) = manager();
        connect(&manager);
        manager.handle_platform_event(PlatformEvent::CharacteristicChanged {
            characteristic: ConnectionConfig::default().notify_characteristic(),
            value: {
                let mut frame = RESPONSE;
                frame[10] = 0x00; // Celsius
                frame.to_vec()
            },
        });
        let before = manager.current_reading().unwrap();
        assert_eq!(before.unit, TemperatureUnit::Celsius);

        assert!(manager.change_unit());
        let after = manager.current_reading().unwrap();
        assert_eq!(after.unit, TemperatureUnit::Fahrenheit);
        assert_eq!(after.temperature, celsius_to_fahrenheit(before.temperature));
        assert_eq!(
            platform.writes().last().unwrap(),
            &vec![0xF5, 0x11, 0x02, 0x00, 0x01, 0x01, 0xFF]
        );

        assert!(manager.change_unit());
        let back = manager.current_reading().unwrap();
        assert_eq!(back.unit, TemperatureUnit::Celsius);
        assert_eq!(back.mode, before.mode);
        assert_eq!(
            platform.writes().last().unwrap(),
            &vec![0xF5, 0x11, 0x02, 0x00, 0x00, 0x00, 0xFF]
        );
    }

    #[test]
    fn change_mode_keeps_unit() {
        let (manager, platform) = manager();
        connect(&manager);
        assert!(manager.change_mode());
        let reading = manager.current_reading().unwrap();
        assert_eq!(reading.mode, ThermometerMode::Surface);
        assert_eq!(reading.unit, TemperatureUnit::Fahrenheit);
        assert_eq!(
            platform.writes().last().unwrap(),
            &vec![0xF5, 0x11, 0x02, 0x01, 0x01, 0x00, 0xFF]
        );
    }

    #[test]
    fn notifications_update_and_broadcast_reading() {
        let (manager, _) = manager();
        let received = readings(&manager);
        connect(&manager);

        manager.handle_platform_event(PlatformEvent::CharacteristicChanged {
            characteristic: ConnectionConfig::default().notify_characteristic(),
            value: RESPONSE.to_vec(),
        });
        manager.bus().flush();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].mode, ThermometerMode::Body);
        assert_eq!(received[0].unit, TemperatureUnit::Fahrenheit);
        assert_eq!(Some(received[0]), manager.current_reading());
    }

    #[test]
    fn short_notifications_keep_reading_silently() {
        let (manager, _) = manager();
        let received = readings(&manager);
        connect(&manager);
        manager.change_mode();
        let before = manager.current_reading();

        manager.handle_platform_event(PlatformEvent::CharacteristicChanged {
            characteristic: ConnectionConfig::default().notify_characteristic(),
            value: vec![0xFA, 0x10],
        });
        manager.bus().flush();
        assert_eq!(manager.current_reading(), before);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn device_events_are_rebroadcast() {
        let (manager, _) = manager();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let listener: ListenerRef<DeviceDescriptor> =
            Arc::new(move |device: &DeviceDescriptor| sink.lock().unwrap().push(device.clone()));
        manager.bus().device_state_changed.register(&listener);

        manager.handle_platform_event(PlatformEvent::DeviceSeen(DeviceSighting::new(
            ADDRESS,
            Some("Thermometer".into()),
            -60,
            flags_record(true),
        )));
        assert_eq!(manager.devices().len(), 1);
        manager.handle_platform_event(PlatformEvent::ConnectionStateChanged {
            address: ADDRESS.into(),
            connected: false,
        });
        manager.bus().flush();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert!(received[0].discovered);
        assert!(!received[1].discovered);
        assert!(manager.devices().is_empty());
    }

    #[test]
    fn link_loss_resets_reading() {
        let (manager, _) = manager();
        connect(&manager);
        manager.handle_platform_event(PlatformEvent::ConnectionStateChanged {
            address: ADDRESS.into(),
            connected: false,
        });
        assert_eq!(manager.current_device(), None);
        assert_eq!(manager.current_reading(), None);
        assert!(!manager.change_unit());
    }

    #[test]
    fn disconnect_clears_current_device() {
        let (manager, platform) = manager();
        connect(&manager);
        manager.handle_platform_event(PlatformEvent::CharacteristicChanged {
            characteristic: ConnectionConfig::default().notify_characteristic(),
            value: RESPONSE.to_vec(),
        });
        assert!(manager.current_reading().is_some());

        manager.disconnect();
        manager.disconnect();
        assert_eq!(manager.current_device(), None);
        assert_eq!(manager.current_reading(), None);

        manager.handle_platform_event(PlatformEvent::ConnectionStateChanged {
            address: ADDRESS.into(),
            connected: false,
        });
        assert_eq!(manager.current_reading(), None);
        assert_eq!(
            platform
                .calls()
                .iter()
                .filter(|call| **call == PlatformCall::Disconnect)
                .count(),
            1
        );
        assert!(!manager.read_temperature());
    }

    #[test]
    fn lost_listeners_see_cleared_state_and_can_reconnect() {
        let (manager, platform) = manager();
        connect(&manager);

        let observed = Arc::new(Mutex::new(Vec::new()));
        let sink = observed.clone();
        let handle = manager.clone();
        let listener: ListenerRef<DeviceDescriptor> = Arc::new(move |device: &DeviceDescriptor| {
            if device.discovered {
                return;
            }
            sink.lock().unwrap().push(handle.current_device());
            handle.connect_thermometer(Some(&self::device())).unwrap();
        });
        manager.bus().device_state_changed.register(&listener);

        manager.handle_platform_event(PlatformEvent::ConnectionStateChanged {
            address: ADDRESS.into(),
            connected: false,
        });
        manager.bus().flush();
        manager.bus().device_state_changed.unregister(&listener);

        assert_eq!(*observed.lock().unwrap(), vec![None]);
        assert_eq!(manager.current_device(), Some(device()));
        assert_eq!(manager.current_reading(), Some(Reading::default()));
        assert_eq!(manager.connection_state(), Some(ConnectionState::Connecting));
        assert_eq!(platform.calls().last(), Some(&PlatformCall::Reconnect));
    }

    #[test]
    fn radio_off_drops_current_device_and_reading() {
        let (manager, _) = manager();
        let received = readings(&manager);
        connect(&manager);
        assert!(manager.is_radio_enabled());

        manager.handle_platform_event(PlatformEvent::RadioStateChanged { enabled: false });
        assert!(!manager.is_radio_enabled());
        assert_eq!(manager.current_device(), None);
        assert_eq!(manager.current_reading(), None);
        assert!(!manager.change_unit());

        manager.bus().flush();
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn starts_inactive_when_radio_is_off() {
        let config = ConnectionConfig::default();
        let platform = MockPlatform::with_gatt(&config);
        platform.set_enabled(false);
        let manager = ThermometerManager::new(platform.clone(), config, None, EventBus::new().unwrap());

        assert!(!manager.is_radio_enabled());
        assert!(!manager.connect_thermometer(Some(&device())).unwrap());
        assert_eq!(manager.current_reading(), None);
        assert!(platform.calls().is_empty());

        manager.close();
        assert!(!manager.is_radio_enabled());
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let (manager, platform) = manager();
        connect(&manager);
        manager.close();
        manager.close();

        assert!(manager.is_closed());
        assert_eq!(manager.current_reading(), None);
        assert!(manager.devices().is_empty());
        assert!(!manager.connect_thermometer(Some(&device())).unwrap());
        assert_eq!(
            platform
                .calls()
                .iter()
                .filter(|call| **call == PlatformCall::Close)
                .count(),
            1
        );
    }

    #[test]
    fn rebind_reuses_equal_config() {
        let (manager, _) = manager();
        connect(&manager);
        let fresh = MockPlatform::new();
        assert!(!manager.rebind(ConnectionConfig::default(), fresh.clone()));
        assert!(manager.current_device().is_some());

        let other = ConnectionConfig::new(
            uuid::Uuid::from_u128(1),
            uuid::Uuid::from_u128(2),
            uuid::Uuid::from_u128(3),
            uuid::Uuid::from_u128(4),
        );
        assert!(manager.rebind(other, fresh));
        assert_eq!(manager.current_device(), None);
        assert_eq!(manager.connection_state(), Some(ConnectionState::Idle));
    }

    #[test]
    fn selection_topic_triggers_connect() {
        let (manager, platform) = manager();
        manager.listen_for_selection();
        manager.bus().device_selected.publish(device());
        manager.bus().flush();

        assert_eq!(manager.current_device(), Some(device()));
        assert_eq!(platform.calls(), vec![PlatformCall::Connect(ADDRESS.into())]);
    }

    #[tokio::test]
    async fn event_pump_drains_queue() {
        let (manager, _) = manager();
        let received = readings(&manager);
        connect(&manager);

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(manager.clone().run_event_pump(rx, Duration::from_millis(10)));
        tx.send(PlatformEvent::CharacteristicChanged {
            characteristic: ConnectionConfig::default().notify_characteristic(),
            value: RESPONSE.to_vec(),
        })
        .unwrap();
        drop(tx);
        pump.await.unwrap();

        manager.bus().flush();
        assert_eq!(received.lock().unwrap().len(), 1);
    }
}
