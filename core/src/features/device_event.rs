// Device events raised by the band itself, such as a tap on the band

use super::{subscribe_key, FeatureError};
use crate::transport::uuids::DEVICE_EVENT;
use crate::transport::GattResolver;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub const EVENT_BUTTON_PRESSED: u8 = 0x04;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub code: u8,
    pub payload: Vec<u8>,
}

impl DeviceEvent {
    /// `None` for an empty notification
    pub fn decode(data: &[u8]) -> Option<Self> {
        let (&code, payload) = data.split_first()?;
        Some(Self {
            code,
            payload: payload.to_vec(),
        })
    }

    pub fn is_button_press(&self) -> bool {
        self.code == EVENT_BUTTON_PRESSED
    }
}

pub async fn subscribe_device_events(
    resolver: &GattResolver,
) -> Result<mpsc::UnboundedReceiver<DeviceEvent>, FeatureError> {
    subscribe_key(resolver, DEVICE_EVENT, DeviceEvent::decode).await
}
