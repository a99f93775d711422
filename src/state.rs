//! Application state management
//! This module wires the bluest adapter, the event bus and the manager
//! together and owns the event pump task.

use std::time::Duration;

use anyhow::Result;
use log::info;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::core::bluetooth::BluestPlatform;
use crate::core::bluetooth::constants::TIMEOUT_POLL_INTERVAL_MS;
use crate::core::events::EventBus;
use crate::core::manager::ThermometerManager;

/// Everything a running thermometer session needs
pub struct ThermometerContext {
    pub config: AppConfig,
    pub manager: ThermometerManager<BluestPlatform>,
    pump: JoinHandle<()>,
}

impl ThermometerContext {
    /// Opens the default adapter and starts the event pump.
    /// Must be called from within a tokio runtime.
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("Initializing thermometer context...");
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let services = if config.scan.filter_by_service {
            vec![config.connection.service()]
        } else {
            Vec::new()
        };
        let platform = BluestPlatform::new(events_tx, services, config.scan.min_rssi).await?;
        let bus = EventBus::new()?;
        let manager = ThermometerManager::new(
            platform,
            config.connection,
            config.connect_timeout(),
            bus,
        );
        manager.listen_for_selection();

        let pump = tokio::spawn(
            manager
                .clone()
                .run_event_pump(events_rx, Duration::from_millis(TIMEOUT_POLL_INTERVAL_MS)),
        );

        Ok(Self {
            config,
            manager,
            pump,
        })
    }

    /// Gets a reference to the event bus
    pub fn bus(&self) -> &EventBus {
        self.manager.bus()
    }

    /// Closes the manager and stops the event pump.
    pub fn close(self) {
        self.manager.close();
        self.pump.abort();
        info!("Thermometer context closed");
    }
}
