// Bandlink Core: client SDK for the band's GATT protocol
//
// `Band` owns the connection to a single band. Everything else borrows it
// through the resolver: the authenticator for the handshake, the feature
// decoders for battery, device info and step counters, and the heart rate
// and device event notifications.

pub mod auth;
pub mod crypto;
pub mod features;
pub mod store;
pub mod transport;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

pub use auth::{AuthError, AuthOptions, AuthState, Authenticator, AuthorizationFlag, CompletionMode};
pub use crypto::{encrypt_block, CipherError};
pub use features::{
    BatteryState, ChargeTimestamp, DeviceEvent, DeviceInfo, FeatureError, StepInfo,
    DEFAULT_MEASUREMENT_TIMEOUT,
};
pub use store::{MemoryStorage, SledStorage, StorageBackend, StorageError};
pub use transport::{
    CacheMode, CharacteristicHandle, Connection, ConnectionState, GattFailure, GattLink,
    GattResolver, Resolution, ServiceCharacteristicKey, ServiceHandle, TransportError,
    ValueChangedCallback,
};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BandError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

// ============================================================================
// CONFIGURATION
// ============================================================================

pub const DEFAULT_DEVICE_NAME: &str = "MI Band 2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandConfig {
    /// Advertised name used to pick the band during discovery
    pub device_name: String,
    /// Options for `Band::authenticate`
    pub auth: AuthOptions,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            auth: AuthOptions::default(),
        }
    }
}

// ============================================================================
// BAND
// ============================================================================

/// Live notification streams from the band
pub struct BandNotifications {
    /// bpm values from the heart rate monitor
    pub heart_rate: mpsc::UnboundedReceiver<u8>,
    pub device_events: mpsc::UnboundedReceiver<DeviceEvent>,
}

#[derive(Clone)]
pub struct Band {
    config: BandConfig,
    connection: ConnectionState,
    resolver: GattResolver,
    authenticator: Authenticator,
}

impl Band {
    /// Create a band handle persisting its authorization through `storage`
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(storage, BandConfig::default())
    }

    pub fn with_config(storage: Arc<dyn StorageBackend>, config: BandConfig) -> Self {
        let connection = ConnectionState::new();
        let resolver = GattResolver::new(connection.clone());
        let authenticator = Authenticator::new(resolver.clone(), AuthorizationFlag::new(storage));

        Self {
            config,
            connection,
            resolver,
            authenticator,
        }
    }

    /// Band whose authorization is forgotten when the process exits
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Band persisting its authorization in a sled database at `path`
    pub fn with_storage(path: impl AsRef<Path>, config: BandConfig) -> Result<Self, BandError> {
        let storage = SledStorage::new(path)?;
        Ok(Self::with_config(Arc::new(storage), config))
    }

    pub fn config(&self) -> &BandConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------------

    /// Make `link` the active connection, replacing any previous one
    pub fn connect(&self, link: Arc<dyn GattLink>) {
        let connection = Connection::new(link);
        tracing::info!("Connected to band {}", connection.device_id());

        if let Some(previous) = self.connection.set(connection) {
            tracing::warn!("Replaced connection to {}", previous.device_id());
        }
    }

    pub async fn disconnect(&self) -> Result<(), BandError> {
        let Some(connection) = self.connection.clear() else {
            return Ok(());
        };
        tracing::info!("Disconnecting from {}", connection.device_id());
        connection.link().disconnect().await?;
        Ok(())
    }

    /// Remove the pairing with the band and drop the connection. A no-op when
    /// not connected.
    pub async fn unpair(&self) -> Result<(), BandError> {
        let Some(connection) = self.connection.current() else {
            tracing::debug!("Unpair requested without a connection");
            return Ok(());
        };
        connection.link().unpair().await?;
        self.connection.clear();
        tracing::info!("Unpaired band {}", connection.device_id());
        Ok(())
    }

    /// True when a link is set and the platform reports it connected
    pub async fn is_connected(&self) -> bool {
        match self.connection.current() {
            Some(connection) => connection.link().is_connected().await,
            None => false,
        }
    }

    pub fn device_id(&self) -> Option<String> {
        self.connection.current().map(|c| c.device_id())
    }

    // ------------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------------

    /// Persisted authorization flag
    pub fn is_authenticated(&self) -> bool {
        self.authenticator.flag().is_set()
    }

    /// Clear the persisted flag so the next handshake starts at level 1
    pub fn forget_authorization(&self) -> Result<(), BandError> {
        self.authenticator.flag().clear()?;
        Ok(())
    }

    /// Authenticate using the options from `BandConfig`
    pub async fn authenticate(&self) -> Result<bool, BandError> {
        self.authenticate_with(&self.config.auth).await
    }

    pub async fn authenticate_with(&self, options: &AuthOptions) -> Result<bool, BandError> {
        Ok(self.authenticator.authenticate(options).await?)
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    // ------------------------------------------------------------------------
    // Features
    // ------------------------------------------------------------------------

    /// Attribute resolution over the active connection
    pub fn resolver(&self) -> &GattResolver {
        &self.resolver
    }

    pub async fn battery_state(&self) -> Result<BatteryState, BandError> {
        Ok(features::read_battery_state(&self.resolver).await?)
    }

    pub async fn device_info(&self) -> Result<DeviceInfo, BandError> {
        Ok(features::read_device_info(&self.resolver).await?)
    }

    pub async fn step_info(&self) -> Result<StepInfo, BandError> {
        Ok(features::read_step_info(&self.resolver).await?)
    }

    // ------------------------------------------------------------------------
    // Heart rate and device events
    // ------------------------------------------------------------------------

    /// Measure the heart rate once, waiting up to `timeout` for the band
    pub async fn heart_rate(&self, timeout: Duration) -> Result<u8, BandError> {
        Ok(features::measure_heart_rate(&self.resolver, timeout).await?)
    }

    pub async fn subscribe_heart_rate(&self) -> Result<mpsc::UnboundedReceiver<u8>, BandError> {
        Ok(features::subscribe_heart_rate(&self.resolver).await?)
    }

    pub async fn start_realtime_heart_rate(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<u8>, BandError> {
        Ok(features::start_realtime_heart_rate(&self.resolver).await?)
    }

    pub async fn stop_realtime_heart_rate(&self) -> Result<(), BandError> {
        Ok(features::stop_realtime_heart_rate(&self.resolver).await?)
    }

    pub async fn set_sleep_heart_rate(&self, enabled: bool) -> Result<(), BandError> {
        Ok(features::set_sleep_measurement(&self.resolver, enabled).await?)
    }

    /// Automatic heart rate measurement every `minutes`, 0 turns it off
    pub async fn set_heart_rate_interval(&self, minutes: u8) -> Result<(), BandError> {
        Ok(features::set_measurement_interval(&self.resolver, minutes).await?)
    }

    pub async fn subscribe_device_events(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<DeviceEvent>, BandError> {
        Ok(features::subscribe_device_events(&self.resolver).await?)
    }

    /// Heart rate and device event notifications together
    pub async fn subscribe_all(&self) -> Result<BandNotifications, BandError> {
        Ok(BandNotifications {
            heart_rate: self.subscribe_heart_rate().await?,
            device_events: self.subscribe_device_events().await?,
        })
    }
}

impl Default for Band {
    fn default() -> Self {
        Self::in_memory()
    }
}
