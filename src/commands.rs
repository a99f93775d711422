//! CLI commands
//! This module implements the intents the binary exposes on top of a
//! running [`ThermometerContext`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{error, info};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout};

use crate::config::AppConfig;
use crate::core::bluetooth::types::{ConnectionState, DeviceDescriptor};
use crate::core::events::ListenerRef;
use crate::core::thermometer::Reading;
use crate::state::ThermometerContext;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Polls `condition` until it holds or `limit` elapses.
async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(POLL_INTERVAL).await;
    }
    condition()
}

/// Scans for `duration`, printing every discovered device as a JSON line.
pub async fn scan_devices(context: &ThermometerContext, duration: Duration) -> Result<Vec<DeviceDescriptor>> {
    let printer: ListenerRef<DeviceDescriptor> = Arc::new(|device: &DeviceDescriptor| {
        if !device.discovered {
            return;
        }
        match serde_json::to_string(device) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize device: {}", e),
        }
    });
    let manager = &context.manager;
    manager.bus().device_state_changed.register(&printer);

    manager.start_scan();
    sleep(duration).await;
    manager.stop_scan();

    manager.bus().flush();
    manager.bus().device_state_changed.unregister(&printer);
    Ok(manager.devices())
}

/// Scans until `address` shows up, then connects and waits for notifications.
pub async fn connect_to_device(context: &ThermometerContext, address: &str, wait: Duration) -> Result<()> {
    let manager = &context.manager;
    if !manager.is_radio_enabled() {
        return Err(anyhow!("Bluetooth radio is off"));
    }

    if manager.device(address).is_none() {
        manager.start_scan();
        let found = wait_until(wait, || manager.device(address).is_some()).await;
        manager.stop_scan();
        if !found {
            return Err(anyhow!("Device {} not found within {:?}", address, wait));
        }
    }

    let device = manager.device(address);
    if !manager.connect_thermometer(device.as_ref())? {
        return Err(anyhow!("Could not start connecting to {}", address));
    }

    let notifying = wait_until(wait, || {
        manager.connection_state() == Some(ConnectionState::Notifying)
    })
    .await;
    if !notifying {
        return Err(anyhow!("Thermometer {} did not become ready within {:?}", address, wait));
    }
    info!("Thermometer {} is ready", address);
    Ok(())
}

/// Sends `request` and waits for the next reading the thermometer reports.
async fn next_reading(
    context: &ThermometerContext,
    wait: Duration,
    request: impl FnOnce() -> bool,
) -> Result<Reading> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener: ListenerRef<Reading> = Arc::new(move |reading: &Reading| {
        let _ = tx.send(*reading);
    });
    let topic = &context.bus().reading_received;
    topic.register(&listener);

    let result = if request() {
        match timeout(wait, rx.recv()).await {
            Ok(Some(reading)) => Ok(reading),
            Ok(None) => Err(anyhow!("Reading channel closed")),
            Err(_) => Err(anyhow!("No reading received within {:?}", wait)),
        }
    } else {
        Err(anyhow!("Thermometer is not connected"))
    };

    topic.unregister(&listener);
    result
}

/// Asks the thermometer for one reading.
pub async fn read_temperature(context: &ThermometerContext, wait: Duration) -> Result<Reading> {
    next_reading(context, wait, || context.manager.read_temperature()).await
}

/// Toggles the unit. Returns the reading before and after.
pub async fn change_unit(context: &ThermometerContext, wait: Duration) -> Result<(Reading, Reading)> {
    let before = read_temperature(context, wait).await?;
    let after = next_reading(context, wait, || {
        context.manager.change_unit() && context.manager.read_temperature()
    })
    .await?;
    Ok((before, after))
}

/// Toggles the mode. Returns the reading before and after.
pub async fn change_mode(context: &ThermometerContext, wait: Duration) -> Result<(Reading, Reading)> {
    let before = read_temperature(context, wait).await?;
    let after = next_reading(context, wait, || {
        context.manager.change_mode() && context.manager.read_temperature()
    })
    .await?;
    Ok((before, after))
}

/// Writes the default configuration to `path`.
pub async fn init_config(path: &Path) -> Result<()> {
    AppConfig::default().save_config(path).await
}
