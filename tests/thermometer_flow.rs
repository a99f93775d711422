use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ble_thermometer::ThermometerError;
use ble_thermometer::config::connection_config::ConnectionConfig;
use ble_thermometer::core::bluetooth::advertisement::flags_record;
use ble_thermometer::core::bluetooth::{
    ConnectionState, DeviceDescriptor, DeviceSighting, MockPlatform, PlatformCall, PlatformEvent,
};
use ble_thermometer::core::{EventBus, ListenerRef, Reading, TemperatureUnit, ThermometerManager, ThermometerMode};

const ADDRESS: &str = "C0:FF:EE:00:00:01";

/// Body mode, Fahrenheit, raw 296 at offset 5
const SAMPLE_FRAME: [u8; 12] = [
    0xFA, 0x10, 0x08, 0x00, 0x00, 0x28, 0x01, 0x00, 0x00, 0x00, 0x01, 0x00,
];

struct Harness {
    manager: ThermometerManager<MockPlatform>,
    platform: MockPlatform,
    devices: Arc<Mutex<Vec<DeviceDescriptor>>>,
    readings: Arc<Mutex<Vec<Reading>>>,
}

fn harness(connect_timeout: Option<Duration>) -> Harness {
    let config = ConnectionConfig::default();
    let platform = MockPlatform::with_gatt(&config);
    let bus = EventBus::new().unwrap();
    let manager = ThermometerManager::new(platform.clone(), config, connect_timeout, bus);

    let devices = Arc::new(Mutex::new(Vec::new()));
    let sink = devices.clone();
    let device_listener: ListenerRef<DeviceDescriptor> =
        Arc::new(move |device: &DeviceDescriptor| sink.lock().unwrap().push(device.clone()));
    manager.bus().device_state_changed.register(&device_listener);

    let readings = Arc::new(Mutex::new(Vec::new()));
    let sink = readings.clone();
    let reading_listener: ListenerRef<Reading> =
        Arc::new(move |reading: &Reading| sink.lock().unwrap().push(*reading));
    manager.bus().reading_received.register(&reading_listener);

    Harness {
        manager,
        platform,
        devices,
        readings,
    }
}

fn advertise(manager: &ThermometerManager<MockPlatform>, address: &str, connectable: bool) {
    manager.handle_platform_event(PlatformEvent::DeviceSeen(DeviceSighting::new(
        address,
        Some("IR Thermometer".to_string()),
        -58,
        flags_record(connectable),
    )));
}

fn link_up(manager: &ThermometerManager<MockPlatform>) {
    manager.handle_platform_event(PlatformEvent::ConnectionStateChanged {
        address: ADDRESS.to_string(),
        connected: true,
    });
    manager.handle_platform_event(PlatformEvent::ServicesDiscovered {
        address: ADDRESS.to_string(),
    });
}

fn notify(manager: &ThermometerManager<MockPlatform>, value: &[u8]) {
    manager.handle_platform_event(PlatformEvent::CharacteristicChanged {
        characteristic: ConnectionConfig::default().notify_characteristic(),
        value: value.to_vec(),
    });
}

#[test]
fn scan_connect_read_and_toggle() {
    let h = harness(None);
    h.manager.start_scan();
    advertise(&h.manager, ADDRESS, true);
    advertise(&h.manager, "C0:FF:EE:00:00:02", false);
    h.manager.stop_scan();

    let devices = h.manager.devices();
    assert_eq!(devices.len(), 1);
    let device = h.manager.device(ADDRESS).unwrap();
    assert_eq!(device.name.as_deref(), Some("IR Thermometer"));

    assert!(h.manager.connect_thermometer(Some(&device)).unwrap());
    link_up(&h.manager);
    assert_eq!(h.manager.connection_state(), Some(ConnectionState::Notifying));

    assert!(h.manager.read_temperature());
    notify(&h.manager, &SAMPLE_FRAME);
    let reading = h.manager.current_reading().unwrap();
    assert_eq!(reading.mode, ThermometerMode::Body);
    assert_eq!(reading.unit, TemperatureUnit::Fahrenheit);
    assert!((reading.temperature - 85.3).abs() < 1e-3);

    assert!(h.manager.change_unit());
    assert!(h.manager.change_mode());
    let reading = h.manager.current_reading().unwrap();
    assert_eq!(reading.unit, TemperatureUnit::Celsius);
    assert_eq!(reading.mode, ThermometerMode::Surface);

    assert_eq!(
        h.platform.writes(),
        vec![
            vec![0xF5, 0x10, 0x00, 0x00, 0xFF],
            vec![0xF5, 0x11, 0x02, 0x00, 0x00, 0x00, 0xFF],
            vec![0xF5, 0x11, 0x02, 0x01, 0x00, 0x01, 0xFF],
        ]
    );

    h.manager.bus().flush();
    assert_eq!(h.devices.lock().unwrap().len(), 1);
    assert_eq!(h.readings.lock().unwrap().len(), 1);
}

#[test]
fn even_unit_toggles_restore_unit_and_mode() {
    let h = harness(None);
    advertise(&h.manager, ADDRESS, true);
    let device = h.manager.device(ADDRESS).unwrap();
    h.manager.connect_thermometer(Some(&device)).unwrap();
    link_up(&h.manager);
    notify(&h.manager, &SAMPLE_FRAME);

    let start = h.manager.current_reading().unwrap();
    for _ in 0..4 {
        assert!(h.manager.change_unit());
    }
    let end = h.manager.current_reading().unwrap();
    assert_eq!(end.unit, start.unit);
    assert_eq!(end.mode, start.mode);
    assert!((end.temperature - start.temperature).abs() <= 0.2);
}

#[test]
fn connect_requires_a_descriptor() {
    let h = harness(None);
    assert!(matches!(
        h.manager.connect_thermometer(None),
        Err(ThermometerError::InvalidArgument(_))
    ));
    assert!(h.platform.calls().is_empty());
}

#[test]
fn link_loss_is_an_event_not_an_error() {
    let h = harness(None);
    advertise(&h.manager, ADDRESS, true);
    let device = h.manager.device(ADDRESS).unwrap();
    h.manager.connect_thermometer(Some(&device)).unwrap();
    link_up(&h.manager);

    h.manager.handle_platform_event(PlatformEvent::ConnectionStateChanged {
        address: ADDRESS.to_string(),
        connected: false,
    });
    h.manager.bus().flush();

    let devices = h.devices.lock().unwrap();
    let lost = devices.last().unwrap();
    assert_eq!(lost.address, ADDRESS);
    assert!(!lost.discovered);
    assert_eq!(h.manager.current_reading(), None);
    assert!(h.manager.devices().is_empty());
    assert!(!h.manager.read_temperature());
}

#[test]
fn radio_off_fails_writes_and_on_recovers() {
    let h = harness(None);
    advertise(&h.manager, ADDRESS, true);
    let device = h.manager.device(ADDRESS).unwrap();
    h.manager.connect_thermometer(Some(&device)).unwrap();
    link_up(&h.manager);

    h.manager
        .handle_platform_event(PlatformEvent::RadioStateChanged { enabled: false });
    assert!(h.manager.devices().is_empty());
    assert_eq!(h.manager.current_reading(), None);
    assert!(!h.manager.read_temperature());
    assert!(!h.manager.connect_thermometer(Some(&device)).unwrap());

    h.manager
        .handle_platform_event(PlatformEvent::RadioStateChanged { enabled: true });
    assert!(h.platform.calls().contains(&PlatformCall::Reinitialize));
    assert!(h.manager.connect_thermometer(Some(&device)).unwrap());
    assert_eq!(h.manager.current_reading(), Some(Reading::default()));
}

#[test]
fn radio_off_forgets_current_thermometer() {
    let h = harness(None);
    advertise(&h.manager, ADDRESS, true);
    let device = h.manager.device(ADDRESS).unwrap();
    h.manager.connect_thermometer(Some(&device)).unwrap();
    link_up(&h.manager);
    notify(&h.manager, &SAMPLE_FRAME);
    assert!(h.manager.current_reading().is_some());

    h.manager
        .handle_platform_event(PlatformEvent::RadioStateChanged { enabled: false });
    assert_eq!(h.manager.current_device(), None);
    assert_eq!(h.manager.current_reading(), None);
    assert!(!h.manager.change_unit());
    assert!(!h.manager.change_mode());

    h.manager.bus().flush();
    let devices = h.devices.lock().unwrap();
    let lost = devices.last().unwrap();
    assert_eq!(lost.address, ADDRESS);
    assert!(!lost.discovered);
    assert_eq!(devices.iter().filter(|d| !d.discovered).count(), 1);
}

#[test]
fn stalled_connect_times_out() {
    let timeout = Duration::from_secs(2);
    let h = harness(Some(timeout));
    advertise(&h.manager, ADDRESS, true);
    let device = h.manager.device(ADDRESS).unwrap();
    h.manager.connect_thermometer(Some(&device)).unwrap();

    h.manager.poll_timeouts(Instant::now() + timeout * 2);
    h.manager.bus().flush();

    assert_eq!(h.manager.connection_state(), Some(ConnectionState::Disconnected));
    assert_eq!(h.manager.current_device(), None);
    assert!(h.devices.lock().unwrap().iter().any(|d| !d.discovered));
}

#[test]
fn selecting_a_device_connects() {
    let h = harness(None);
    h.manager.listen_for_selection();
    advertise(&h.manager, ADDRESS, true);

    let device = h.manager.device(ADDRESS).unwrap();
    h.manager.bus().device_selected.publish(device.clone());
    h.manager.bus().flush();

    assert_eq!(h.manager.current_device(), Some(device));
    assert_eq!(h.platform.calls(), vec![PlatformCall::Connect(ADDRESS.to_string())]);
}
