//! In-memory platform adapter recording every call made to it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::config::connection_config::ConnectionConfig;
use crate::core::bluetooth::platform::PlatformAdapter;
use crate::core::bluetooth::types::DeviceSighting;
use crate::error::TransportError;

/// One recorded platform request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Scan(bool),
    Connect(String),
    Reconnect,
    DiscoverServices,
    Subscribe { characteristic: Uuid, enable: bool },
    WriteDescriptor { descriptor: Uuid, value: Vec<u8> },
    Write { characteristic: Uuid, value: Vec<u8> },
    Disconnect,
    Close,
    Reinitialize,
}

#[derive(Debug, Default)]
struct MockState {
    enabled: bool,
    fail_connect: bool,
    bonded: Vec<DeviceSighting>,
    /// service -> characteristics
    gatt: HashMap<Uuid, HashSet<Uuid>>,
    /// (characteristic, descriptor)
    descriptors: HashSet<(Uuid, Uuid)>,
    calls: Vec<PlatformCall>,
}

/// Clonable handle; all clones share the same recorded state.
#[derive(Debug, Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<MockState>>,
}

impl MockPlatform {
    /// A powered-on adapter whose peripheral exposes no services
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                enabled: true,
                ..MockState::default()
            })),
        }
    }

    /// A powered-on adapter whose peripheral matches `config`
    pub fn with_gatt(config: &ConnectionConfig) -> Self {
        let platform = Self::new();
        {
            let mut state = platform.lock();
            state.gatt.insert(
                config.service(),
                HashSet::from([config.notify_characteristic(), config.write_characteristic()]),
            );
            state.descriptors.insert((
                config.notify_characteristic(),
                config.client_config_descriptor(),
            ));
        }
        platform
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }

    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    pub fn add_bonded(&self, sighting: DeviceSighting) {
        self.lock().bonded.push(sighting);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Values written to characteristics, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                PlatformCall::Write { value, .. } => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlatformCall) {
        self.lock().calls.push(call);
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for MockPlatform {
    fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    fn bonded_devices(&mut self) -> Vec<DeviceSighting> {
        self.lock().bonded.clone()
    }

    fn scan(&mut self, start: bool) -> Result<(), TransportError> {
        self.record(PlatformCall::Scan(start));
        Ok(())
    }

    fn connect(&mut self, address: &str) -> Result<(), TransportError> {
        if self.lock().fail_connect {
            return Err(TransportError::DeviceNotFound(address.to_string()));
        }
        self.record(PlatformCall::Connect(address.to_string()));
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), TransportError> {
        self.record(PlatformCall::Reconnect);
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), TransportError> {
        self.record(PlatformCall::DiscoverServices);
        Ok(())
    }

    fn has_characteristic(&self, service: Uuid, characteristic: Uuid) -> bool {
        self.lock()
            .gatt
            .get(&service)
            .map(|chars| chars.contains(&characteristic))
            .unwrap_or(false)
    }

    fn subscribe(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        enable: bool,
    ) -> Result<(), TransportError> {
        if !self.has_characteristic(service, characteristic) {
            return Err(TransportError::CharacteristicNotFound(characteristic));
        }
        self.record(PlatformCall::Subscribe {
            characteristic,
            enable,
        });
        Ok(())
    }

    fn write_descriptor(
        &mut self,
        _service: Uuid,
        characteristic: Uuid,
        descriptor: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError> {
        if !self.lock().descriptors.contains(&(characteristic, descriptor)) {
            return Err(TransportError::DescriptorNotFound(descriptor));
        }
        self.record(PlatformCall::WriteDescriptor {
            descriptor,
            value: value.to_vec(),
        });
        Ok(())
    }

    fn write(
        &mut self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<(), TransportError> {
        if !self.has_characteristic(service, characteristic) {
            return Err(TransportError::CharacteristicNotFound(characteristic));
        }
        self.record(PlatformCall::Write {
            characteristic,
            value: value.to_vec(),
        });
        Ok(())
    }

    fn disconnect(&mut self) {
        self.record(PlatformCall::Disconnect);
    }

    fn close(&mut self) {
        self.record(PlatformCall::Close);
    }

    fn reinitialize(&mut self) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.enabled = true;
        state.calls.push(PlatformCall::Reinitialize);
        Ok(())
    }
}
