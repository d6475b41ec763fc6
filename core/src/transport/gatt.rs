//! GATT link abstraction for the band connection
//!
//! This module defines the boundary between the SDK and the platform BLE stack:
//! the handle types that name services and characteristics, the per-operation
//! failure status, and the `GattLink` trait a platform backend implements for
//! one live connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors for connection-level transport problems
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Not connected to a band")]
    NotConnected,
    #[error("Platform error: {0}")]
    Platform(String),
}

/// Non-success communication status of a single GATT operation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GattFailure {
    #[error("Device unreachable")]
    Unreachable,
    #[error("Protocol error")]
    ProtocolError,
    #[error("Access denied")]
    AccessDenied,
}

/// Whether a read may be served from the platform attribute cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheMode {
    /// Accept a value cached by the platform
    Cached,
    /// Always query the device
    #[default]
    Uncached,
}

/// A primary service found on the connected device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    pub uuid: Uuid,
}

/// A resolved characteristic, valid for the connection it was resolved on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    /// UUID of the owning service
    pub service: Uuid,
    /// UUID of the characteristic itself
    pub uuid: Uuid,
}

impl fmt::Display for CharacteristicHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.uuid)
    }
}

/// Value-changed handler: receives the UUID of the characteristic that
/// produced the notification and the notified bytes.
///
/// Platforms invoke it from their own execution context, so it must not block.
pub type ValueChangedCallback = Arc<dyn Fn(Uuid, Vec<u8>) + Send + Sync>;

/// One live connection to a band, implemented by the platform BLE backend
#[async_trait]
pub trait GattLink: Send + Sync {
    /// Platform identifier of the connected device (address or device id)
    fn device_id(&self) -> String;

    /// Whether the platform still reports the link as connected
    async fn is_connected(&self) -> bool;

    /// Query the device for services with the given UUID
    async fn services_for_uuid(&self, service: Uuid) -> Result<Vec<ServiceHandle>, GattFailure>;

    /// Query a service's characteristics, optionally filtered by UUID
    async fn characteristics(
        &self,
        service: &ServiceHandle,
        filter: Option<Uuid>,
    ) -> Result<Vec<CharacteristicHandle>, GattFailure>;

    /// Read a characteristic value
    async fn read(
        &self,
        characteristic: &CharacteristicHandle,
        cache: CacheMode,
    ) -> Result<Vec<u8>, GattFailure>;

    /// Write a characteristic value with response
    async fn write(
        &self,
        characteristic: &CharacteristicHandle,
        value: &[u8],
    ) -> Result<(), GattFailure>;

    /// Write the client configuration descriptor so the device sends notifications
    async fn enable_notifications(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<(), GattFailure>;

    /// Register the value-changed handler for a characteristic.
    ///
    /// A characteristic has at most one handler; registering replaces (and
    /// drops) the previous one.
    fn set_on_value_changed(
        &self,
        characteristic: &CharacteristicHandle,
        callback: ValueChangedCallback,
    ) -> Result<(), GattFailure>;

    /// Close the link
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Remove the OS-level pairing with the device
    async fn unpair(&self) -> Result<(), TransportError>;
}
