// Device name and Device Information Service strings

use super::{read_key, FeatureError};
use crate::transport::uuids::{DEVICE_NAME, HARDWARE_REVISION, SERIAL_NUMBER, SOFTWARE_REVISION};
use crate::transport::{CacheMode, GattResolver, ServiceCharacteristicKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_name: String,
    pub serial_number: String,
    pub hardware_revision: String,
    pub software_revision: String,
}

fn decode_string(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .to_string()
}

async fn read_string(
    resolver: &GattResolver,
    key: ServiceCharacteristicKey,
) -> Result<String, FeatureError> {
    let data = read_key(resolver, key, CacheMode::Uncached).await?;
    Ok(decode_string(&data))
}

pub async fn read_device_info(resolver: &GattResolver) -> Result<DeviceInfo, FeatureError> {
    Ok(DeviceInfo {
        device_name: read_string(resolver, DEVICE_NAME).await?,
        serial_number: read_string(resolver, SERIAL_NUMBER).await?,
        hardware_revision: read_string(resolver, HARDWARE_REVISION).await?,
        software_revision: read_string(resolver, SOFTWARE_REVISION).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockBand;
    use crate::transport::{Connection, ConnectionState, TransportError};
    use std::sync::Arc;

    #[test]
    fn test_decode_string() {
        assert_eq!(decode_string(b"MI Band 2\0\0"), "MI Band 2");
        assert_eq!(decode_string(&[0x56, 0xff, 0x31]), "V\u{fffd}1");
        assert_eq!(decode_string(&[]), "");
    }

    #[tokio::test]
    async fn test_read_device_info() {
        let band = Arc::new(MockBand::new());
        band.set_value(DEVICE_NAME, b"MI Band 2");
        band.set_value(SERIAL_NUMBER, b"1234567");
        band.set_value(HARDWARE_REVISION, b"V0.1.3.3");
        band.set_value(SOFTWARE_REVISION, b"V1.0.1.81");

        let state = ConnectionState::new();
        state.set(Connection::new(band.clone()));

        let info = read_device_info(&GattResolver::new(state)).await.unwrap();
        assert_eq!(
            info,
            DeviceInfo {
                device_name: "MI Band 2".into(),
                serial_number: "1234567".into(),
                hardware_revision: "V0.1.3.3".into(),
                software_revision: "V1.0.1.81".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_denied_characteristic_is_unavailable() {
        let band = Arc::new(MockBand::new());
        band.deny(SERIAL_NUMBER.characteristic);

        let state = ConnectionState::new();
        state.set(Connection::new(band.clone()));

        let result = read_device_info(&GattResolver::new(state)).await;
        assert_eq!(result, Err(FeatureError::Unavailable(SERIAL_NUMBER)));
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let result = read_device_info(&GattResolver::new(ConnectionState::new())).await;
        assert_eq!(
            result,
            Err(FeatureError::Transport(TransportError::NotConnected))
        );
    }
}
