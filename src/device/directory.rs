//! Device directory fed by the coordinator's retained device list

use crate::command::DeviceTarget;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One entry of `<base>/bridge/devices`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceInfo {
    pub friendly_name: String,
    pub ieee_address: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
}

impl DeviceInfo {
    /// Addressing information for operations on this device
    pub fn target(&self) -> DeviceTarget {
        DeviceTarget {
            ieee_address: self.ieee_address.clone(),
            device_type: self.device_type.clone(),
        }
    }
}

/// Friendly-name lookup table
#[derive(Debug, Default)]
pub struct DeviceDirectory {
    devices: RwLock<HashMap<String, DeviceInfo>>,
}

impl DeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_devices(devices: impl IntoIterator<Item = DeviceInfo>) -> Self {
        Self {
            devices: RwLock::new(index(devices)),
        }
    }

    /// Replace every entry with `devices`
    pub async fn replace(&self, devices: impl IntoIterator<Item = DeviceInfo>) {
        *self.devices.write().await = index(devices);
    }

    /// Replace the directory from a raw device list message.
    ///
    /// The coordinator also lists itself; entries without the fields we need
    /// are skipped rather than failing the whole list.
    pub async fn update_from_bridge(&self, raw: &[u8]) -> Result<usize, serde_json::Error> {
        let entries: Vec<serde_json::Value> = serde_json::from_slice(raw)?;
        let total = entries.len();

        let devices: Vec<DeviceInfo> = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();

        if devices.len() < total {
            debug!(
                "[DEVICES] Skipped {} incomplete entries",
                total - devices.len()
            );
        }

        let count = devices.len();
        self.replace(devices).await;
        info!("[DEVICES] Directory updated: {} devices", count);
        Ok(count)
    }

    pub async fn lookup(&self, friendly_name: &str) -> Option<DeviceInfo> {
        self.devices.read().await.get(friendly_name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }
}

fn index(devices: impl IntoIterator<Item = DeviceInfo>) -> HashMap<String, DeviceInfo> {
    devices
        .into_iter()
        .map(|device| (device.friendly_name.clone(), device))
        .collect()
}
