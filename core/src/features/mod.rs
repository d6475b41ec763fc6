// Features module: decoders for the band's characteristics, plus the
// notification-driven heart rate monitor and device events

pub mod battery;
pub mod device_event;
pub mod device_info;
pub mod heart_rate;
pub mod steps;

pub use battery::{read_battery_state, BatteryState, ChargeTimestamp};
pub use device_event::{subscribe_device_events, DeviceEvent};
pub use device_info::{read_device_info, DeviceInfo};
pub use heart_rate::{
    measure_heart_rate, set_measurement_interval, set_sleep_measurement,
    start_realtime_heart_rate, stop_realtime_heart_rate, subscribe_heart_rate,
    DEFAULT_MEASUREMENT_TIMEOUT,
};
pub use steps::{read_step_info, StepInfo};

use crate::transport::{
    CacheMode, CharacteristicHandle, GattFailure, GattResolver, ServiceCharacteristicKey,
    TransportError, ValueChangedCallback,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{trace, warn};
use uuid::Uuid;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeatureError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Characteristic {0} unavailable")]
    Unavailable(ServiceCharacteristicKey),
    #[error("Reading {key} failed: {failure}")]
    Read {
        key: ServiceCharacteristicKey,
        failure: GattFailure,
    },
    #[error("{what} payload too short: expected {expected} bytes, got {actual}")]
    TooShort {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("Writing {0} failed")]
    WriteFailed(ServiceCharacteristicKey),
    #[error("Notifications on {0} unavailable")]
    NotificationsUnavailable(ServiceCharacteristicKey),
    #[error("Notifications on {0} stopped")]
    NotificationsClosed(ServiceCharacteristicKey),
    #[error("No value within {0:?}")]
    Timeout(Duration),
}

pub(crate) async fn resolve_key(
    resolver: &GattResolver,
    key: ServiceCharacteristicKey,
) -> Result<CharacteristicHandle, FeatureError> {
    resolver
        .resolve(key)
        .await?
        .ok_or(FeatureError::Unavailable(key))
}

pub(crate) async fn read_key(
    resolver: &GattResolver,
    key: ServiceCharacteristicKey,
    cache: CacheMode,
) -> Result<Vec<u8>, FeatureError> {
    let handle = resolve_key(resolver, key).await?;
    resolver
        .read(&handle, cache)
        .await
        .map_err(|failure| FeatureError::Read { key, failure })
}

pub(crate) fn ensure_len(
    what: &'static str,
    data: &[u8],
    expected: usize,
) -> Result<(), FeatureError> {
    if data.len() < expected {
        return Err(FeatureError::TooShort {
            what,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

pub(crate) async fn write_key(
    resolver: &GattResolver,
    key: ServiceCharacteristicKey,
    value: &[u8],
) -> Result<(), FeatureError> {
    let handle = resolve_key(resolver, key).await?;
    if !resolver.write(&handle, value).await {
        return Err(FeatureError::WriteFailed(key));
    }
    Ok(())
}

/// Enable notifications on `key` and forward every value `decode` accepts.
///
/// The receiver stays live until the handler is replaced or the link drops it.
pub(crate) async fn subscribe_key<T, F>(
    resolver: &GattResolver,
    key: ServiceCharacteristicKey,
    decode: F,
) -> Result<mpsc::UnboundedReceiver<T>, FeatureError>
where
    T: Send + 'static,
    F: Fn(&[u8]) -> Option<T> + Send + Sync + 'static,
{
    let handle = resolve_key(resolver, key).await?;
    if !resolver.enable_notifications(&handle).await {
        return Err(FeatureError::NotificationsUnavailable(key));
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let callback: ValueChangedCallback = Arc::new(move |source: Uuid, value: Vec<u8>| {
        if source != key.characteristic {
            trace!("Ignoring notification from {}", source);
            return;
        }
        match decode(&value) {
            Some(item) => {
                let _ = tx.send(item);
            }
            None => warn!("Undecodable notification on {}: {}", key, hex::encode(&value)),
        }
    });
    if !resolver.subscribe(&handle, callback) {
        return Err(FeatureError::NotificationsUnavailable(key));
    }
    Ok(rx)
}
