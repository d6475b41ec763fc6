// Step counter decoder
//
// Layout: [1..3] steps (LE u16), [5..9] distance in metres (LE u32),
// [9..13] calories (LE u32).

use super::{ensure_len, resolve_key, FeatureError};
use crate::transport::uuids::STEP_INFO;
use crate::transport::{CacheMode, GattFailure, GattResolver};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const STEP_PAYLOAD_LEN: usize = 13;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInfo {
    pub steps: u32,
    pub distance: u32,
    pub calories: u32,
}

impl StepInfo {
    pub fn decode(data: &[u8]) -> Result<Self, FeatureError> {
        ensure_len("Step", data, STEP_PAYLOAD_LEN)?;

        Ok(Self {
            steps: u32::from(u16::from_le_bytes([data[1], data[2]])),
            distance: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
            calories: u32::from_le_bytes([data[9], data[10], data[11], data[12]]),
        })
    }
}

/// Read today's step counters. A protocol error on the live read falls back to
/// the platform's cached value.
pub async fn read_step_info(resolver: &GattResolver) -> Result<StepInfo, FeatureError> {
    let handle = resolve_key(resolver, STEP_INFO).await?;

    let data = match resolver.read(&handle, CacheMode::Uncached).await {
        Ok(data) => data,
        Err(GattFailure::ProtocolError) => {
            warn!("Protocol error reading steps, trying the cached value");
            resolver
                .read(&handle, CacheMode::Cached)
                .await
                .map_err(|failure| FeatureError::Read {
                    key: STEP_INFO,
                    failure,
                })?
        }
        Err(failure) => {
            return Err(FeatureError::Read {
                key: STEP_INFO,
                failure,
            })
        }
    };

    let info = StepInfo::decode(&data)?;
    debug!(
        "Steps: {}, distance: {}, calories: {}",
        info.steps, info.distance, info.calories
    );
    Ok(info)
}
