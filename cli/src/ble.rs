//! Desktop BLE backend
//!
//! Scans for bands with btleplug and wraps a connected peripheral in a
//! `GattLink` so the core SDK can drive it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bandlink_core::{
    CacheMode, CharacteristicHandle, GattFailure, GattLink, ServiceHandle, TransportError,
    ValueChangedCallback,
};
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A band seen while scanning
#[derive(Debug, Clone)]
pub struct DiscoveredBand {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .context("Failed to start Bluetooth manager")?;
    let adapters = manager.adapters().await.context("Failed to list adapters")?;
    adapters
        .into_iter()
        .next()
        .context("No Bluetooth adapter found")
}

async fn scan_peripherals(adapter: &Adapter, duration: Duration) -> Result<Vec<Peripheral>> {
    adapter
        .start_scan(ScanFilter::default())
        .await
        .context("Failed to start scan")?;
    tokio::time::sleep(duration).await;
    let peripherals = adapter.peripherals().await.context("Failed to list peripherals")?;
    if let Err(e) = adapter.stop_scan().await {
        tracing::warn!("Failed to stop scan: {}", e);
    }
    Ok(peripherals)
}

/// Scan for advertising devices
pub async fn scan(duration: Duration) -> Result<Vec<DiscoveredBand>> {
    let adapter = get_adapter().await?;
    let mut devices = Vec::new();

    for peripheral in scan_peripherals(&adapter, duration).await? {
        if let Some(props) = peripheral.properties().await? {
            devices.push(DiscoveredBand {
                name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
                address: peripheral.address().to_string(),
                rssi: props.rssi,
            });
        }
    }

    Ok(devices)
}

/// Find the band advertising `name`
pub async fn find_band(name: &str, duration: Duration) -> Result<Peripheral> {
    let adapter = get_adapter().await?;

    for peripheral in scan_peripherals(&adapter, duration).await? {
        if let Some(props) = peripheral.properties().await? {
            if props.local_name.as_deref() == Some(name) {
                return Ok(peripheral);
            }
        }
    }

    anyhow::bail!("No band named '{}' found", name)
}

fn gatt_failure(err: &btleplug::Error) -> GattFailure {
    match err {
        btleplug::Error::PermissionDenied => GattFailure::AccessDenied,
        btleplug::Error::NotConnected
        | btleplug::Error::DeviceNotFound
        | btleplug::Error::TimedOut(_) => GattFailure::Unreachable,
        _ => GattFailure::ProtocolError,
    }
}

/// `GattLink` over a btleplug peripheral
pub struct BtleLink {
    peripheral: Peripheral,
    address: String,
    handlers: Arc<Mutex<HashMap<Uuid, ValueChangedCallback>>>,
    pump: JoinHandle<()>,
}

impl BtleLink {
    /// Connect, discover services and start routing notifications
    pub async fn connect(peripheral: Peripheral) -> Result<Self> {
        if !peripheral.is_connected().await.unwrap_or(false) {
            peripheral.connect().await.context("Failed to connect to band")?;
        }
        peripheral
            .discover_services()
            .await
            .context("Service discovery failed")?;

        let handlers: Arc<Mutex<HashMap<Uuid, ValueChangedCallback>>> = Arc::default();
        let mut notifications = peripheral
            .notifications()
            .await
            .context("Failed to open notification stream")?;

        let routed = handlers.clone();
        let pump = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                let handler = routed.lock().get(&notification.uuid).cloned();
                match handler {
                    Some(handler) => handler(notification.uuid, notification.value),
                    None => tracing::trace!("Unrouted notification from {}", notification.uuid),
                }
            }
        });

        let address = peripheral.address().to_string();
        tracing::info!("Connected to {}", address);

        Ok(Self {
            peripheral,
            address,
            handlers,
            pump,
        })
    }

    fn find(&self, handle: &CharacteristicHandle) -> Result<Characteristic, GattFailure> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == handle.uuid && c.service_uuid == handle.service)
            .ok_or(GattFailure::ProtocolError)
    }
}

impl Drop for BtleLink {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[async_trait]
impl GattLink for BtleLink {
    fn device_id(&self) -> String {
        self.address.clone()
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn services_for_uuid(&self, service: Uuid) -> Result<Vec<ServiceHandle>, GattFailure> {
        if !self.is_connected().await {
            return Err(GattFailure::Unreachable);
        }
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| s.uuid == service)
            .map(|s| ServiceHandle { uuid: s.uuid })
            .collect())
    }

    async fn characteristics(
        &self,
        service: &ServiceHandle,
        filter: Option<Uuid>,
    ) -> Result<Vec<CharacteristicHandle>, GattFailure> {
        if !self.is_connected().await {
            return Err(GattFailure::Unreachable);
        }
        Ok(self
            .peripheral
            .characteristics()
            .into_iter()
            .filter(|c| c.service_uuid == service.uuid)
            .filter(|c| filter.map_or(true, |uuid| uuid == c.uuid))
            .map(|c| CharacteristicHandle {
                service: c.service_uuid,
                uuid: c.uuid,
            })
            .collect())
    }

    // btleplug always reads from the device; the cache mode has no equivalent.
    async fn read(
        &self,
        characteristic: &CharacteristicHandle,
        _cache: CacheMode,
    ) -> Result<Vec<u8>, GattFailure> {
        let target = self.find(characteristic)?;
        self.peripheral
            .read(&target)
            .await
            .map_err(|e| gatt_failure(&e))
    }

    async fn write(
        &self,
        characteristic: &CharacteristicHandle,
        value: &[u8],
    ) -> Result<(), GattFailure> {
        let target = self.find(characteristic)?;
        self.peripheral
            .write(&target, value, WriteType::WithResponse)
            .await
            .map_err(|e| gatt_failure(&e))
    }

    async fn enable_notifications(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<(), GattFailure> {
        let target = self.find(characteristic)?;
        self.peripheral
            .subscribe(&target)
            .await
            .map_err(|e| gatt_failure(&e))
    }

    fn set_on_value_changed(
        &self,
        characteristic: &CharacteristicHandle,
        callback: ValueChangedCallback,
    ) -> Result<(), GattFailure> {
        let previous = self.handlers.lock().insert(characteristic.uuid, callback);
        drop(previous);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.handlers.lock().clear();
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| TransportError::Platform(e.to_string()))
    }

    async fn unpair(&self) -> Result<(), TransportError> {
        Err(TransportError::Platform(
            "unpairing is not supported by the desktop backend; remove the band in the system Bluetooth settings".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_mapping() {
        assert_eq!(
            gatt_failure(&btleplug::Error::PermissionDenied),
            GattFailure::AccessDenied
        );
        assert_eq!(
            gatt_failure(&btleplug::Error::NotConnected),
            GattFailure::Unreachable
        );
        assert_eq!(
            gatt_failure(&btleplug::Error::TimedOut(Duration::from_secs(1))),
            GattFailure::Unreachable
        );
        assert_eq!(
            gatt_failure(&btleplug::Error::RuntimeError("boom".into())),
            GattFailure::ProtocolError
        );
    }
}
