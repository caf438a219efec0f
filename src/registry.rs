//! Device inventory consumed by the scheduler and updated by the poll pipeline
//!
//! The process that runs the scheduler owns the [`DeviceStore`]. A gateway
//! running elsewhere accepts syncs through [`PublishedInventory`], which checks
//! the new inventory and forwards it on the bus to that store.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::bus::{INVENTORY_TOPIC, MessageBus, publish_json};
use crate::model::{Device, DeviceStatus, InventorySnapshot};

#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn list_devices(&self) -> anyhow::Result<Vec<Device>>;

    /// Record the outcome of a poll: success marks the device online and
    /// refreshes `last_seen`, failure marks it offline
    async fn record_poll(&self, device_id: &str, success: bool, at: DateTime<Utc>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    DuplicateIp {
        ip: IpAddr,
        existing: String,
        rejected: String,
    },

    /// The inventory could not be handed to the store's owner
    Unavailable(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateIp {
                ip,
                existing,
                rejected,
            } => write!(
                f,
                "device '{rejected}' uses IP {ip} which is already assigned to '{existing}'"
            ),
            RegistryError::Unavailable(reason) => write!(f, "inventory unavailable: {reason}"),
        }
    }
}

impl std::error::Error for RegistryError {}

impl RegistryError {
    /// True when the inventory itself was rejected
    pub fn is_caller_error(&self) -> bool {
        matches!(self, RegistryError::DuplicateIp { .. })
    }
}

/// Whole-inventory replacement, as done by the sync endpoint
#[async_trait]
pub trait InventorySync: Send + Sync {
    /// Replace every device at once; returns the number of devices accepted
    async fn sync(&self, devices: Vec<Device>) -> Result<usize, RegistryError>;

    async fn device_count(&self) -> usize;
}

/// In-memory, read-mostly device store shared between services
#[derive(Debug, Default)]
pub struct DeviceStore {
    devices: RwLock<HashMap<String, Device>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_devices(devices: Vec<Device>) -> Result<Self, RegistryError> {
        Ok(Self {
            devices: RwLock::new(index_devices(devices)?),
        })
    }

    /// Insert or replace a single device, keeping IP addresses unique
    pub async fn upsert(&self, device: Device) -> Result<(), RegistryError> {
        let mut devices = self.devices.write().await;

        if let Some(existing) = devices
            .values()
            .find(|d| d.ip_address == device.ip_address && d.id != device.id)
        {
            return Err(RegistryError::DuplicateIp {
                ip: device.ip_address,
                existing: existing.id.clone(),
                rejected: device.id,
            });
        }

        devices.insert(device.id.clone(), device);
        Ok(())
    }

    /// Replace the whole inventory; on error the store is left untouched
    pub async fn replace_all(&self, devices: Vec<Device>) -> Result<usize, RegistryError> {
        let indexed = index_devices(devices)?;
        let count = indexed.len();

        *self.devices.write().await = indexed;
        debug!("device store replaced with {count} devices");

        Ok(count)
    }

    pub async fn get(&self, device_id: &str) -> Option<Device> {
        self.devices.read().await.get(device_id).cloned()
    }

    /// Snapshot of all devices, ordered by id
    pub async fn list(&self) -> Vec<Device> {
        let mut devices: Vec<Device> = self.devices.read().await.values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }
}

fn index_devices(devices: Vec<Device>) -> Result<HashMap<String, Device>, RegistryError> {
    let mut by_id: HashMap<String, Device> = HashMap::with_capacity(devices.len());
    let mut by_ip: HashMap<IpAddr, String> = HashMap::with_capacity(devices.len());

    for device in devices {
        if let Some(existing) = by_ip.get(&device.ip_address) {
            if *existing != device.id {
                return Err(RegistryError::DuplicateIp {
                    ip: device.ip_address,
                    existing: existing.clone(),
                    rejected: device.id,
                });
            }
        }

        if let Some(previous) = by_id.get(&device.id) {
            by_ip.remove(&previous.ip_address);
        }

        by_ip.insert(device.ip_address, device.id.clone());
        by_id.insert(device.id.clone(), device);
    }

    Ok(by_id)
}

#[async_trait]
impl DeviceRegistry for DeviceStore {
    async fn list_devices(&self) -> anyhow::Result<Vec<Device>> {
        Ok(self.list().await)
    }

    async fn record_poll(&self, device_id: &str, success: bool, at: DateTime<Utc>) {
        let mut devices = self.devices.write().await;

        let Some(device) = devices.get_mut(device_id) else {
            trace!("poll result for unknown device {device_id}");
            return;
        };

        if success {
            device.status = DeviceStatus::Online;
            device.last_seen = Some(at);
        } else {
            device.status = DeviceStatus::Offline;
        }
    }
}

#[async_trait]
impl InventorySync for DeviceStore {
    async fn sync(&self, devices: Vec<Device>) -> Result<usize, RegistryError> {
        self.replace_all(devices).await
    }

    async fn device_count(&self) -> usize {
        self.len().await
    }
}

/// Inventory of a service that does not own the scheduler's store
///
/// A sync is validated against a local mirror and then published on
/// [`INVENTORY_TOPIC`]. The mirror is only replaced once the publish went out.
pub struct PublishedInventory {
    mirror: DeviceStore,
    bus: Arc<dyn MessageBus>,
}

impl PublishedInventory {
    pub fn new(bus: Arc<dyn MessageBus>, devices: Vec<Device>) -> Result<Self, RegistryError> {
        Ok(Self {
            mirror: DeviceStore::from_devices(devices)?,
            bus,
        })
    }
}

#[async_trait]
impl InventorySync for PublishedInventory {
    async fn sync(&self, devices: Vec<Device>) -> Result<usize, RegistryError> {
        let count = index_devices(devices.clone())?.len();

        let snapshot = InventorySnapshot {
            devices,
            timestamp: Utc::now(),
        };
        publish_json(self.bus.as_ref(), INVENTORY_TOPIC, &snapshot)
            .await
            .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        debug!("published inventory of {count} devices");

        self.mirror.replace_all(snapshot.devices).await
    }

    async fn device_count(&self) -> usize {
        self.mirror.len().await
    }
}
