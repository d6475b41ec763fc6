//! Transport resolver
//!
//! Maps (service, characteristic) identifiers to live handles on the current
//! connection, and exposes the read/write/subscribe surface that the
//! authenticator and feature decoders use.
//!
//! Failure policy:
//! - no connection is a hard error (`TransportError::NotConnected`)
//! - access denied or a protocol error during lookup is a soft, empty result
//! - nothing is cached and nothing is retried; each call queries the device

use super::connection::ConnectionState;
use super::gatt::{
    CacheMode, CharacteristicHandle, GattFailure, GattLink, ServiceHandle, TransportError,
    ValueChangedCallback,
};
use super::uuids::ServiceCharacteristicKey;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of a lookup against the connected device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The attribute exists and is accessible
    Found(T),
    /// The device does not expose the attribute, or answered with a protocol error
    NotFound,
    /// The device refused access
    Denied,
    /// No link, or the link dropped during the query
    Disconnected,
}

impl<T> Resolution<T> {
    /// Collapse into the two-tier form: disconnection is an error, every
    /// other miss is an empty result.
    pub fn into_result(self) -> Result<Option<T>, TransportError> {
        match self {
            Resolution::Found(value) => Ok(Some(value)),
            Resolution::NotFound | Resolution::Denied => Ok(None),
            Resolution::Disconnected => Err(TransportError::NotConnected),
        }
    }

    fn from_failure(failure: GattFailure) -> Self {
        match failure {
            GattFailure::AccessDenied => Resolution::Denied,
            GattFailure::ProtocolError => Resolution::NotFound,
            GattFailure::Unreachable => Resolution::Disconnected,
        }
    }
}

/// Resolves attributes on whatever connection the shared state currently holds
#[derive(Clone)]
pub struct GattResolver {
    connection: ConnectionState,
}

impl GattResolver {
    pub fn new(connection: ConnectionState) -> Self {
        Self { connection }
    }

    fn link(&self) -> Option<Arc<dyn GattLink>> {
        self.connection.current().map(|c| c.link().clone())
    }

    /// Look up a service by UUID
    pub async fn lookup_service(&self, service: Uuid) -> Resolution<ServiceHandle> {
        let Some(link) = self.link() else {
            return Resolution::Disconnected;
        };
        Self::first_service(link.as_ref(), service).await
    }

    async fn first_service(link: &dyn GattLink, service: Uuid) -> Resolution<ServiceHandle> {
        match link.services_for_uuid(service).await {
            Ok(services) => match services.into_iter().next() {
                Some(handle) => Resolution::Found(handle),
                None => {
                    debug!("Service {} not present on device", service);
                    Resolution::NotFound
                }
            },
            Err(failure) => {
                warn!("Error while getting service {}: {}", service, failure);
                Resolution::from_failure(failure)
            }
        }
    }

    /// Look up a characteristic within a service
    pub async fn lookup_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Resolution<CharacteristicHandle> {
        let Some(link) = self.link() else {
            return Resolution::Disconnected;
        };

        let service_handle = match Self::first_service(link.as_ref(), service).await {
            Resolution::Found(handle) => handle,
            Resolution::NotFound => return Resolution::NotFound,
            Resolution::Denied => return Resolution::Denied,
            Resolution::Disconnected => return Resolution::Disconnected,
        };

        match link
            .characteristics(&service_handle, Some(characteristic))
            .await
        {
            Ok(found) => match found.into_iter().next() {
                Some(handle) => Resolution::Found(handle),
                None => {
                    debug!("Characteristic {} not present in {}", characteristic, service);
                    Resolution::NotFound
                }
            },
            Err(failure) => {
                warn!(
                    "Error while getting characteristic {}: {}",
                    characteristic, failure
                );
                Resolution::from_failure(failure)
            }
        }
    }

    /// Resolve a characteristic handle.
    ///
    /// Returns `Err(NotConnected)` when there is no link and `Ok(None)` when
    /// the device denied access or reported a protocol error.
    pub async fn resolve_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Option<CharacteristicHandle>, TransportError> {
        self.lookup_characteristic(service, characteristic)
            .await
            .into_result()
    }

    /// Resolve an entry of the fixed UUID table
    pub async fn resolve(
        &self,
        key: ServiceCharacteristicKey,
    ) -> Result<Option<CharacteristicHandle>, TransportError> {
        self.resolve_characteristic(key.service, key.characteristic)
            .await
    }

    /// Get a service by UUID
    pub async fn service_by_uuid(
        &self,
        service: Uuid,
    ) -> Result<Option<ServiceHandle>, TransportError> {
        self.lookup_service(service).await.into_result()
    }

    /// Get all characteristics of a service; empty on soft failures
    pub async fn characteristics_of_service(
        &self,
        service: Uuid,
    ) -> Result<Vec<CharacteristicHandle>, TransportError> {
        let link = self.link().ok_or(TransportError::NotConnected)?;

        let Some(service_handle) = Self::first_service(link.as_ref(), service)
            .await
            .into_result()?
        else {
            return Ok(Vec::new());
        };

        match link.characteristics(&service_handle, None).await {
            Ok(all) => Ok(all),
            Err(GattFailure::Unreachable) => Err(TransportError::NotConnected),
            Err(failure) => {
                warn!("Error while listing characteristics of {}: {}", service, failure);
                Ok(Vec::new())
            }
        }
    }

    /// Read a characteristic value
    pub async fn read(
        &self,
        characteristic: &CharacteristicHandle,
        cache: CacheMode,
    ) -> Result<Vec<u8>, GattFailure> {
        let link = self.link().ok_or(GattFailure::Unreachable)?;
        link.read(characteristic, cache).await
    }

    /// Write a value; `true` iff the transport reported success
    pub async fn write(&self, characteristic: &CharacteristicHandle, value: &[u8]) -> bool {
        let Some(link) = self.link() else {
            warn!("Write to {} dropped: not connected", characteristic.uuid);
            return false;
        };

        match link.write(characteristic, value).await {
            Ok(()) => {
                debug!("Wrote {} to {}", hex::encode(value), characteristic.uuid);
                true
            }
            Err(failure) => {
                warn!("Write to {} failed: {}", characteristic.uuid, failure);
                false
            }
        }
    }

    /// Ask the device to notify value changes; `true` on success
    pub async fn enable_notifications(&self, characteristic: &CharacteristicHandle) -> bool {
        let Some(link) = self.link() else {
            return false;
        };

        match link.enable_notifications(characteristic).await {
            Ok(()) => true,
            Err(failure) => {
                warn!(
                    "Enabling notifications on {} failed: {}",
                    characteristic.uuid, failure
                );
                false
            }
        }
    }

    /// Register a value-changed callback; `true` on success
    pub fn subscribe(
        &self,
        characteristic: &CharacteristicHandle,
        callback: ValueChangedCallback,
    ) -> bool {
        let Some(link) = self.link() else {
            return false;
        };

        match link.set_on_value_changed(characteristic, callback) {
            Ok(()) => true,
            Err(failure) => {
                warn!("Subscribing to {} failed: {}", characteristic.uuid, failure);
                false
            }
        }
    }
}
