//! bluest-backed platform adapter
//! Every request is spawned onto the tokio runtime the adapter was created
//! on; results come back through the platform event queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use bluest::{Adapter, AdapterEvent, Characteristic, Device, Uuid};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::constants::{ENABLE_NOTIFICATION_VALUE, LINK_POLL_INTERVAL_MS};
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::platform::PlatformAdapter;
use crate::core::bluetooth::scanner::{BluetoothScanner, DeviceTable, device_address};
use crate::core::bluetooth::types::{DeviceSighting, PlatformEvent};
use crate::error::TransportError;

/// Characteristics found by the last service discovery, per service
type GattTable = Arc<Mutex<HashMap<Uuid, HashMap<Uuid, Characteristic>>>>;

/// [`PlatformAdapter`] on top of the system Bluetooth stack
pub struct BluestPlatform {
    adapter: Adapter,
    runtime: Handle,
    events: UnboundedSender<PlatformEvent>,
    enabled: Arc<AtomicBool>,
    devices: DeviceTable,
    scanner: BluetoothScanner,
    notifications: NotificationHandler,
    gatt: GattTable,
    /// Device the current GATT handle is bound to
    device: Option<(String, Device)>,
    link_token: Option<CancellationToken>,
    adapter_token: CancellationToken,
}

impl BluestPlatform {
    /// Opens the default adapter. Must be called from within a tokio runtime.
    pub async fn new(
        events: UnboundedSender<PlatformEvent>,
        services: Vec<Uuid>,
        min_rssi: Option<i16>,
    ) -> Result<Self> {
        let adapter = Adapter::default().await.ok_or(TransportError::NoAdapter)?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        let runtime = Handle::current();
        let devices: DeviceTable = Arc::new(Mutex::new(HashMap::new()));
        let scanner = BluetoothScanner::new(
            adapter.clone(),
            runtime.clone(),
            devices.clone(),
            events.clone(),
            services,
            min_rssi,
        );
        if let Err(e) = scanner.refresh_bonded().await {
            warn!("Failed to list connected devices: {}", e);
        }

        let enabled = Arc::new(AtomicBool::new(true));
        let adapter_token = CancellationToken::new();
        runtime.spawn(Self::watch_adapter(
            adapter.clone(),
            enabled.clone(),
            events.clone(),
            adapter_token.clone(),
        ));

        Ok(Self {
            adapter,
            runtime,
            events,
            enabled,
            devices,
            scanner,
            notifications: NotificationHandler::new(),
            gatt: Arc::new(Mutex::new(HashMap::new())),
            device: None,
            link_token: None,
            adapter_token,
        })
    }

    fn gatt(&self) -> MutexGuard<'_, HashMap<Uuid, HashMap<Uuid, Characteristic>>> {
        self.gatt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<Characteristic, TransportError> {
        let gatt = self.gatt();
        let chars = gatt
            .get(&service)
            .ok_or(TransportError::ServiceNotFound(service))?;
        chars
            .get(&characteristic)
            .cloned()
            .ok_or(TransportError::CharacteristicNotFound(characteristic))
    }

    fn current(&self) -> Result<(String, Device), TransportError> {
        self.device.clone().ok_or(TransportError::NoActiveConnection)
    }

    async fn watch_adapter(
        adapter: Adapter,
        enabled: Arc<AtomicBool>,
        events: UnboundedSender<PlatformEvent>,
        cancel_token: CancellationToken,
    ) {
        let mut adapter_events = match adapter.events().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Adapter state changes are not observable: {}", e);
                return;
            }
        };

        loop {
            tokio::select! {
                event = adapter_events.next() => {
                    let on = match event {
                        Some(Ok(AdapterEvent::Available)) => true,
                        Some(Ok(AdapterEvent::Unavailable)) => false,
                        Some(Err(e)) => {
                            error!("Error in adapter event stream: {}", e);
                            break;
                        }
                        None => break,
                    };
                    if enabled.swap(on, Ordering::SeqCst) != on {
                        info!("Bluetooth adapter is now {}", if on { "available" } else { "unavailable" });
                        if events.send(PlatformEvent::RadioStateChanged { enabled: on }).is_err() {
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => break,
            }
        }
        debug!("Adapter watcher stopped");
    }

    /// Connects, reports the outcome, then reports link loss.
    fn spawn_link_task(&mut self, address: String, device: Device) {
        if let Some(token) = self.link_token.take() {
            token.cancel();
        }
        let cancel_token = CancellationToken::new();
        let cancel_token_for_task = cancel_token.clone();
        let adapter = self.adapter.clone();
        let events = self.events.clone();

        self.runtime.spawn(async move {
            let connected = tokio::select! {
                result = adapter.connect_device(&device) => result,
                _ = cancel_token_for_task.cancelled() => return,
            };
            if let Err(e) = connected {
                warn!("Failed to connect to {}: {}", address, e);
                let _ = events.send(PlatformEvent::ConnectionStateChanged { address, connected: false });
                return;
            }
            if events
                .send(PlatformEvent::ConnectionStateChanged { address: address.clone(), connected: true })
                .is_err()
            {
                return;
            }

            let mut interval = tokio::time::interval(Duration::from_millis(LINK_POLL_INTERVAL_MS));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !device.is_connected().await {
                            info!("Link to {} was lost", address);
                            let _ = events.send(PlatformEvent::ConnectionStateChanged { address, connected: false });
                            break;
                        }
                    }
                    _ = cancel_token_for_task.cancelled() => break,
                }
            }
        });
        self.link_token = Some(cancel_token);
    }
}

impl PlatformAdapter for BluestPlatform {
    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn bonded_devices(&mut self) -> Vec<DeviceSighting> {
        self.scanner.bonded()
    }

    fn scan(&mut self, start: bool) -> Result<(), TransportError> {
        if !self.is_enabled() {
            return Err(TransportError::RadioOff);
        }
        if start {
            self.scanner.start_scan();
        } else {
            self.scanner.stop_scan();
        }
        Ok(())
    }

    fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        let device = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(address)
            .cloned()
            .ok_or_else(|| TransportError::DeviceNotFound(address.to_string()))?;

        self.device = Some((address.to_string(), device.clone()));
        self.spawn_link_task(address.to_string(), device);
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        let (address, device) = self.current()?;
        self.spawn_link_task(address, device);
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), TransportError> {
        let (address, device) = self.current()?;
        let gatt = self.gatt.clone();
        let events = self.events.clone();

        self.runtime.spawn(async move {
            let services = match device.discover_services().await {
                Ok(services) => services,
                Err(e) => {
                    error!("Service discovery on {} failed: {}", address, e);
                    return;
                }
            };

            let mut table = HashMap::new();
            for service in services {
                let chars = match service.characteristics().await {
                    Ok(chars) => chars,
                    Err(e) => {
                        warn!("Failed to list characteristics of {}: {}", service.uuid(), e);
                        continue;
                    }
                };
                debug!("Available service: {} ({} characteristics)", service.uuid(), chars.len());
                table.insert(
                    service.uuid(),
                    chars.into_iter().map(|c| (c.uuid(), c)).collect::<HashMap<_, _>>(),
                );
            }
            *gatt.lock().unwrap_or_else(PoisonError::into_inner) = table;
            let _ = events.send(PlatformEvent::ServicesDiscovered { address });
        });
        Ok(())
    }

    fn has_characteristic(&self, service: Uuid, characteristic: Uuid) -> bool {
        self.characteristic(service, characteristic).is_ok()
    }

    fn subscribe(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        enable: bool,
    ) -> Result<(), TransportError> {
        if !enable {
            self.notifications.stop_notifications();
            return Ok(());
        }
        let notify_char = self.characteristic(service, characteristic)?;
        self.notifications
            .setup_notifications(&self.runtime, notify_char, self.events.clone());
        Ok(())
    }

    fn write_descriptor(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError> {
        self.characteristic(service, characteristic)?;
        // The notify stream owns the client-config descriptor
        if value == ENABLE_NOTIFICATION_VALUE && !self.notifications.is_active() {
            return Err(TransportError::DescriptorNotFound(descriptor));
        }
        debug!(
            "Descriptor {} write {:02X?} handled by the notify stream",
            descriptor, value
        );
        Ok(())
    }

    fn write(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError> {
        let write_char = self.characteristic(service, characteristic)?;
        let data = value.to_vec();
        self.runtime.spawn(async move {
            if let Err(e) = write_char.write(&data).await {
                error!("Failed to write to {}: {}", write_char.uuid(), e);
            }
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        let Some((address, device)) = self.device.clone() else {
            return;
        };
        let adapter = self.adapter.clone();
        self.runtime.spawn(async move {
            if let Err(e) = adapter.disconnect_device(&device).await {
                warn!("Failed to disconnect from {}: {}", address, e);
            }
        });
    }

    fn close(&mut self) {
        self.notifications.stop_notifications();
        if let Some(token) = self.link_token.take() {
            token.cancel();
        }
        self.gatt().clear();
        if self.device.is_some() {
            self.disconnect();
            self.device = None;
        }
    }

    fn reinitialize(&mut self) -> Result<(), TransportError> {
        self.close();
        self.scanner.stop_scan();
        self.devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.scanner.spawn_refresh_bonded();
        self.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for BluestPlatform {
    fn drop(&mut self) {
        self.adapter_token.cancel();
        if let Some(token) = self.link_token.take() {
            token.cancel();
        }
    }
}
