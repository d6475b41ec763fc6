// Battery characteristic decoder
//
// Layout (at least 19 bytes):
//   [1]      charge level, percent
//   [2]      0 = normal, 1 = charging
//   [11..13] last charge year, little endian
//   [13..18] month, day, hour, minute, second
//   [18]     charge cycles

use super::{ensure_len, read_key, FeatureError};
use crate::transport::uuids::BATTERY_INFO;
use crate::transport::{CacheMode, GattResolver};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

const BATTERY_PAYLOAD_LEN: usize = 19;
const CHARGING: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl ChargeTimestamp {
    fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
    }
}

impl fmt::Display for ChargeTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatteryState {
    pub charge_level: u8,
    pub is_charging: bool,
    /// `None` when the band has never reported a plausible date
    pub last_charge: Option<ChargeTimestamp>,
    pub cycles: u8,
}

impl BatteryState {
    pub fn decode(data: &[u8]) -> Result<Self, FeatureError> {
        ensure_len("Battery", data, BATTERY_PAYLOAD_LEN)?;

        let timestamp = ChargeTimestamp {
            year: u16::from_le_bytes([data[11], data[12]]),
            month: data[13],
            day: data[14],
            hour: data[15],
            minute: data[16],
            second: data[17],
        };

        Ok(Self {
            charge_level: data[1],
            is_charging: data[2] == CHARGING,
            last_charge: timestamp.is_valid().then_some(timestamp),
            cycles: data[18],
        })
    }
}

/// Read and decode the battery characteristic, bypassing the attribute cache
pub async fn read_battery_state(resolver: &GattResolver) -> Result<BatteryState, FeatureError> {
    let data = read_key(resolver, BATTERY_INFO, CacheMode::Uncached).await?;
    let state = BatteryState::decode(&data)?;
    debug!(
        "Battery: {}%, charging={}, cycles={}",
        state.charge_level, state.is_charging, state.cycles
    );
    Ok(state)
}
