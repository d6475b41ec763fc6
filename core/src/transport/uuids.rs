//! Fixed GATT identifier table for the band
//!
//! Every characteristic the SDK touches is named here as a
//! [`ServiceCharacteristicKey`]. Standard Bluetooth SIG attributes use the
//! SIG base UUID; vendor characteristics use the band's own base.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Bluetooth SIG base UUID `00000000-0000-1000-8000-00805F9B34FB`
const SIG_BASE: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Band vendor base UUID `00000000-0000-3512-2118-0009AF100700`
const BAND_BASE: u128 = 0x00000000_0000_3512_2118_0009af100700;

/// Expand a 16-bit SIG-assigned number into a full UUID
pub const fn sig_uuid(short: u16) -> Uuid {
    Uuid::from_u128(SIG_BASE | ((short as u128) << 96))
}

/// Expand a 16-bit vendor number into a full band UUID
pub const fn band_uuid(short: u16) -> Uuid {
    Uuid::from_u128(BAND_BASE | ((short as u128) << 96))
}

// Services
pub const MIBAND_SERVICE: Uuid = sig_uuid(0xfee0);
pub const AUTH_SERVICE: Uuid = sig_uuid(0xfee1);
pub const GENERIC_ACCESS_SERVICE: Uuid = sig_uuid(0x1800);
pub const DEVICE_INFO_SERVICE: Uuid = sig_uuid(0x180a);
pub const HEART_RATE_SERVICE: Uuid = sig_uuid(0x180d);

/// (service, characteristic) pair naming one attribute on the band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceCharacteristicKey {
    pub service: Uuid,
    pub characteristic: Uuid,
}

impl ServiceCharacteristicKey {
    pub const fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

impl fmt::Display for ServiceCharacteristicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.characteristic)
    }
}

pub const AUTH: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(AUTH_SERVICE, band_uuid(0x0009));
pub const BATTERY_INFO: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(MIBAND_SERVICE, band_uuid(0x0006));
pub const STEP_INFO: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(MIBAND_SERVICE, band_uuid(0x0007));
pub const DEVICE_EVENT: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(MIBAND_SERVICE, band_uuid(0x0010));
pub const DEVICE_NAME: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(GENERIC_ACCESS_SERVICE, sig_uuid(0x2a00));
pub const SERIAL_NUMBER: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(DEVICE_INFO_SERVICE, sig_uuid(0x2a25));
pub const HARDWARE_REVISION: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(DEVICE_INFO_SERVICE, sig_uuid(0x2a27));
pub const SOFTWARE_REVISION: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(DEVICE_INFO_SERVICE, sig_uuid(0x2a28));
pub const HEART_RATE_MEASUREMENT: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(HEART_RATE_SERVICE, sig_uuid(0x2a37));
pub const HEART_RATE_CONTROL_POINT: ServiceCharacteristicKey =
    ServiceCharacteristicKey::new(HEART_RATE_SERVICE, sig_uuid(0x2a39));

/// Every attribute in the table
pub const ALL_KEYS: [ServiceCharacteristicKey; 10] = [
    AUTH,
    BATTERY_INFO,
    STEP_INFO,
    DEVICE_EVENT,
    DEVICE_NAME,
    SERIAL_NUMBER,
    HARDWARE_REVISION,
    SOFTWARE_REVISION,
    HEART_RATE_MEASUREMENT,
    HEART_RATE_CONTROL_POINT,
];
