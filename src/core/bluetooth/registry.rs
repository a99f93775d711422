//! Address-keyed set of discovered devices.

use std::collections::HashMap;

use crate::core::bluetooth::types::DeviceDescriptor;

/// Deduplicating registry of discovered peripherals, listed in discovery order.
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceDescriptor>,
    order: Vec<String>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new device or merges the fields of a known one.
    /// Returns true when the address was not known before.
    pub fn upsert(&mut self, descriptor: DeviceDescriptor) -> bool {
        match self.devices.get_mut(&descriptor.address) {
            Some(existing) => {
                if descriptor.name.is_some() {
                    existing.name = descriptor.name;
                }
                existing.rssi = descriptor.rssi;
                existing.discovered = descriptor.discovered;
                false
            }
            None => {
                self.order.push(descriptor.address.clone());
                self.devices.insert(descriptor.address.clone(), descriptor);
                true
            }
        }
    }

    pub fn remove(&mut self, address: &str) -> Option<DeviceDescriptor> {
        let removed = self.devices.remove(address)?;
        self.order.retain(|known| known != address);
        Some(removed)
    }

    pub fn get(&self, address: &str) -> Option<&DeviceDescriptor> {
        self.devices.get(address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.devices.contains_key(address)
    }

    /// Snapshot of the registry in discovery order
    pub fn list(&self) -> Vec<DeviceDescriptor> {
        self.order
            .iter()
            .filter_map(|address| self.devices.get(address))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
        self.order.clear();
    }
}
