use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use bluest::{Adapter, Device, Uuid};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::advertisement::flags_record;
use crate::core::bluetooth::types::{DeviceSighting, PlatformEvent};
use crate::utils::extract_mac_address;

/// Devices seen by the adapter, keyed by address
pub type DeviceTable = Arc<Mutex<HashMap<String, Device>>>;

/// Address used to key a bluest device
pub fn device_address(device: &Device) -> String {
    let id = device.id().to_string();
    extract_mac_address(&id).unwrap_or(id)
}

/// Runs the bluest scan stream on a background task and posts every
/// advertisement as a [`PlatformEvent::DeviceSeen`].
pub struct BluetoothScanner {
    adapter: Adapter,
    runtime: Handle,
    devices: DeviceTable,
    bonded: Arc<Mutex<Vec<DeviceSighting>>>,
    events: UnboundedSender<PlatformEvent>,
    services: Vec<Uuid>,
    min_rssi: Option<i16>,
    cancel_token: CancellationToken,
    scan_task_handle: Option<JoinHandle<()>>,
}

impl BluetoothScanner {
    pub fn new(
        adapter: Adapter,
        runtime: Handle,
        devices: DeviceTable,
        events: UnboundedSender<PlatformEvent>,
        services: Vec<Uuid>,
        min_rssi: Option<i16>,
    ) -> Self {
        Self {
            adapter,
            runtime,
            devices,
            bonded: Arc::new(Mutex::new(Vec::new())),
            events,
            services,
            min_rssi,
            cancel_token: CancellationToken::new(),
            scan_task_handle: None,
        }
    }

    /// Devices the adapter already holds a link to, as of the last refresh
    pub fn bonded(&self) -> Vec<DeviceSighting> {
        self.bonded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reloads the bonded device cache from the adapter.
    pub async fn refresh_bonded(&self) -> Result<()> {
        let sightings = Self::connected_sightings(&self.adapter, &self.devices).await?;
        *self.bonded.lock().unwrap_or_else(PoisonError::into_inner) = sightings;
        Ok(())
    }

    /// Reloads the bonded device cache in the background.
    pub fn spawn_refresh_bonded(&self) {
        let adapter = self.adapter.clone();
        let devices = self.devices.clone();
        let bonded = self.bonded.clone();
        self.runtime.spawn(async move {
            match Self::connected_sightings(&adapter, &devices).await {
                Ok(sightings) => {
                    debug!("Bonded device cache refreshed ({} devices)", sightings.len());
                    *bonded.lock().unwrap_or_else(PoisonError::into_inner) = sightings;
                }
                Err(e) => warn!("Failed to list connected devices: {}", e),
            }
        });
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn start_scan(&mut self) {
        if self.is_scanning() {
            self.stop_scan();
        }

        self.cancel_token = CancellationToken::new();
        let cancel_token_for_task = self.cancel_token.clone();
        let adapter_for_task = self.adapter.clone();
        let devices_for_task = self.devices.clone();
        let bonded_for_task = self.bonded.clone();
        let events_for_task = self.events.clone();
        let services = self.services.clone();
        let min_rssi = self.min_rssi;

        let handle = self.runtime.spawn(async move {
            if let Err(e) = Self::internal_scan_task(
                adapter_for_task,
                devices_for_task,
                bonded_for_task,
                events_for_task,
                cancel_token_for_task,
                services,
                min_rssi,
            )
            .await
            {
                error!("Scan task failed: {}", e);
            }
        });
        self.scan_task_handle = Some(handle);
        info!("Device scan task started.");
    }

    pub fn stop_scan(&mut self) {
        self.cancel_token.cancel();
        if self.scan_task_handle.take().is_some() {
            info!("Stopping Bluetooth scan.");
        }
    }

    async fn connected_sightings(adapter: &Adapter, devices: &DeviceTable) -> Result<Vec<DeviceSighting>> {
        let connected = adapter.connected_devices().await?;
        let mut sightings = Vec::with_capacity(connected.len());
        for device in connected {
            let address = device_address(&device);
            let name = device.name().ok();
            devices
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(address.clone(), device);
            sightings.push(DeviceSighting::new(address, name, 0, Vec::new()));
        }
        Ok(sightings)
    }

    async fn internal_scan_task(
        adapter: Adapter,
        devices: DeviceTable,
        bonded: Arc<Mutex<Vec<DeviceSighting>>>,
        events: UnboundedSender<PlatformEvent>,
        cancel_token: CancellationToken,
        services: Vec<Uuid>,
        min_rssi: Option<i16>,
    ) -> Result<()> {
        // Links opened outside this process never advertise, report them first
        let sightings = Self::connected_sightings(&adapter, &devices).await?;
        *bonded.lock().unwrap_or_else(PoisonError::into_inner) = sightings.clone();
        for sighting in sightings {
            if events.send(PlatformEvent::DeviceSeen(sighting)).is_err() {
                return Ok(());
            }
        }

        info!("Starting bluetooth scan");
        let mut scan_stream = adapter.scan(&services).await?;

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    let Some(discovered) = result else {
                        info!("Bluetooth scan stream has ended.");
                        break;
                    };
                    let rssi = discovered.rssi.unwrap_or(i16::MIN);
                    if min_rssi.is_some_and(|threshold| rssi < threshold) {
                        continue;
                    }

                    let device = discovered.device;
                    let address = device_address(&device);
                    let name = discovered
                        .adv_data
                        .local_name
                        .or_else(|| device.name().ok());
                    debug!("Found device - Address: {}, Name: {:?}, RSSI: {}", address, name, rssi);

                    devices
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(address.clone(), device);
                    let sighting = DeviceSighting::new(
                        address,
                        name,
                        rssi,
                        flags_record(discovered.adv_data.is_connectable),
                    );
                    if events.send(PlatformEvent::DeviceSeen(sighting)).is_err() {
                        break;
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
        Ok(())
    }
}

impl Drop for BluetoothScanner {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
