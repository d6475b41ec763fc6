// Heart rate monitor
//
// Measurements arrive as notifications on the standard measurement
// characteristic with the bpm in byte 1. Measurements are started and the
// monitor modes switched by writing to the control point.

use super::{ensure_len, subscribe_key, write_key, FeatureError};
use crate::transport::uuids::{HEART_RATE_CONTROL_POINT, HEART_RATE_MEASUREMENT};
use crate::transport::GattResolver;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

pub const DEFAULT_MEASUREMENT_TIMEOUT: Duration = Duration::from_secs(30);

const CONTROL_HEART_RATE: u8 = 0x15;
const CONTROL_INTERVAL: u8 = 0x14;

const MODE_SLEEP: u8 = 0x00;
const MODE_CONTINUOUS: u8 = 0x01;
const MODE_MANUAL: u8 = 0x02;

pub fn start_measurement_frame() -> [u8; 3] {
    [CONTROL_HEART_RATE, MODE_MANUAL, 0x01]
}

pub fn sleep_measurement_frame(enabled: bool) -> [u8; 3] {
    [CONTROL_HEART_RATE, MODE_SLEEP, u8::from(enabled)]
}

/// Realtime monitoring switches manual mode off and continuous mode on, and
/// the reverse to stop
pub fn realtime_frames(enabled: bool) -> [[u8; 3]; 2] {
    [
        [CONTROL_HEART_RATE, MODE_MANUAL, u8::from(!enabled)],
        [CONTROL_HEART_RATE, MODE_CONTINUOUS, u8::from(enabled)],
    ]
}

/// Automatic measurement every `minutes`, 0 turns it off
pub fn measurement_interval_frame(minutes: u8) -> [u8; 2] {
    [CONTROL_INTERVAL, minutes]
}

pub fn decode_heart_rate(data: &[u8]) -> Result<u8, FeatureError> {
    ensure_len("Heart rate", data, 2)?;
    Ok(data[1])
}

/// Stream of bpm values notified by the band
pub async fn subscribe_heart_rate(
    resolver: &GattResolver,
) -> Result<mpsc::UnboundedReceiver<u8>, FeatureError> {
    subscribe_key(resolver, HEART_RATE_MEASUREMENT, |data| {
        decode_heart_rate(data).ok()
    })
    .await
}

/// Run a single measurement and wait up to `timeout` for its result
pub async fn measure_heart_rate(
    resolver: &GattResolver,
    timeout: Duration,
) -> Result<u8, FeatureError> {
    let mut samples = subscribe_heart_rate(resolver).await?;
    write_key(resolver, HEART_RATE_CONTROL_POINT, &start_measurement_frame()).await?;
    debug!("Heart rate measurement started");

    match tokio::time::timeout(timeout, samples.recv()).await {
        Ok(Some(bpm)) => {
            info!("Heart rate: {} bpm", bpm);
            Ok(bpm)
        }
        Ok(None) => Err(FeatureError::NotificationsClosed(HEART_RATE_MEASUREMENT)),
        Err(_) => Err(FeatureError::Timeout(timeout)),
    }
}

/// Switch on continuous monitoring and stream its values
pub async fn start_realtime_heart_rate(
    resolver: &GattResolver,
) -> Result<mpsc::UnboundedReceiver<u8>, FeatureError> {
    let samples = subscribe_heart_rate(resolver).await?;
    for frame in realtime_frames(true) {
        write_key(resolver, HEART_RATE_CONTROL_POINT, &frame).await?;
    }
    info!("Realtime heart rate monitoring on");
    Ok(samples)
}

pub async fn stop_realtime_heart_rate(resolver: &GattResolver) -> Result<(), FeatureError> {
    for frame in realtime_frames(false) {
        write_key(resolver, HEART_RATE_CONTROL_POINT, &frame).await?;
    }
    info!("Realtime heart rate monitoring off");
    Ok(())
}

pub async fn set_sleep_measurement(
    resolver: &GattResolver,
    enabled: bool,
) -> Result<(), FeatureError> {
    write_key(
        resolver,
        HEART_RATE_CONTROL_POINT,
        &sleep_measurement_frame(enabled),
    )
    .await
}

pub async fn set_measurement_interval(
    resolver: &GattResolver,
    minutes: u8,
) -> Result<(), FeatureError> {
    write_key(
        resolver,
        HEART_RATE_CONTROL_POINT,
        &measurement_interval_frame(minutes),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockBand;
    use crate::transport::uuids::{self, DEVICE_EVENT};
    use crate::transport::{Connection, ConnectionState};
    use std::sync::Arc;

    const MEASUREMENT: uuid::Uuid = HEART_RATE_MEASUREMENT.characteristic;
    const CONTROL_POINT: uuid::Uuid = HEART_RATE_CONTROL_POINT.characteristic;

    fn resolver_for(band: &Arc<MockBand>) -> GattResolver {
        let state = ConnectionState::new();
        state.set(Connection::new(band.clone()));
        GattResolver::new(state)
    }

    async fn wait_for_write(band: &MockBand, characteristic: uuid::Uuid) {
        while band.writes_to(characteristic).is_empty() {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_control_frames() {
        assert_eq!(start_measurement_frame(), [0x15, 0x02, 0x01]);
        assert_eq!(sleep_measurement_frame(true), [0x15, 0x00, 0x01]);
        assert_eq!(sleep_measurement_frame(false), [0x15, 0x00, 0x00]);
        assert_eq!(realtime_frames(true), [[0x15, 0x02, 0x00], [0x15, 0x01, 0x01]]);
        assert_eq!(realtime_frames(false), [[0x15, 0x02, 0x01], [0x15, 0x01, 0x00]]);
        assert_eq!(measurement_interval_frame(10), [0x14, 10]);
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode_heart_rate(&[0x00, 72]), Ok(72));
        assert!(matches!(
            decode_heart_rate(&[0x00]),
            Err(FeatureError::TooShort { actual: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_measure_returns_notified_bpm() {
        let band = Arc::new(MockBand::new());
        let resolver = resolver_for(&band);

        let call = tokio::spawn(async move {
            measure_heart_rate(&resolver, Duration::from_secs(1)).await
        });
        wait_for_write(&band, CONTROL_POINT).await;
        assert!(band.notify(MEASUREMENT, &[0x00, 64]));

        assert_eq!(call.await.unwrap(), Ok(64));
        assert!(band.is_notifying(MEASUREMENT));
        assert_eq!(band.writes_to(CONTROL_POINT), vec![vec![0x15, 0x02, 0x01]]);
    }

    #[tokio::test]
    async fn test_measure_times_out() {
        let band = Arc::new(MockBand::new());
        let limit = Duration::from_millis(20);

        let result = measure_heart_rate(&resolver_for(&band), limit).await;

        assert_eq!(result, Err(FeatureError::Timeout(limit)));
        assert_eq!(band.writes_to(CONTROL_POINT).len(), 1);
    }

    #[tokio::test]
    async fn test_measure_fails_when_start_not_written() {
        let band = Arc::new(MockBand::new());
        band.fail_writes(true);

        let result = measure_heart_rate(&resolver_for(&band), Duration::from_secs(1)).await;
        assert_eq!(
            result,
            Err(FeatureError::WriteFailed(HEART_RATE_CONTROL_POINT))
        );
    }

    #[tokio::test]
    async fn test_measure_unavailable_when_denied() {
        let band = Arc::new(MockBand::new());
        band.deny(MEASUREMENT);

        let result = measure_heart_rate(&resolver_for(&band), Duration::from_secs(1)).await;
        assert_eq!(
            result,
            Err(FeatureError::Unavailable(HEART_RATE_MEASUREMENT))
        );
        assert!(band.writes().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_streams_values() {
        let band = Arc::new(MockBand::new());
        let mut samples = subscribe_heart_rate(&resolver_for(&band)).await.unwrap();

        assert!(band.notify(MEASUREMENT, &[0x00, 70]));
        assert!(band.notify(MEASUREMENT, &[0x00]));
        assert!(band.emit(MEASUREMENT, DEVICE_EVENT.characteristic, &[0x00, 99]));
        assert!(band.notify(MEASUREMENT, &[0x00, 75]));

        assert_eq!(samples.recv().await, Some(70));
        assert_eq!(samples.recv().await, Some(75));
        assert!(samples.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_realtime_start_and_stop() {
        let band = Arc::new(MockBand::new());
        let resolver = resolver_for(&band);

        let mut samples = start_realtime_heart_rate(&resolver).await.unwrap();
        assert!(band.notify(MEASUREMENT, &[0x00, 81]));
        assert_eq!(samples.recv().await, Some(81));

        stop_realtime_heart_rate(&resolver).await.unwrap();
        assert_eq!(
            band.writes_to(CONTROL_POINT),
            vec![
                vec![0x15, 0x02, 0x00],
                vec![0x15, 0x01, 0x01],
                vec![0x15, 0x02, 0x01],
                vec![0x15, 0x01, 0x00],
            ]
        );
    }

    #[tokio::test]
    async fn test_monitor_settings() {
        let band = Arc::new(MockBand::new());
        let resolver = resolver_for(&band);

        set_sleep_measurement(&resolver, true).await.unwrap();
        set_measurement_interval(&resolver, 5).await.unwrap();

        assert_eq!(
            band.writes_to(uuids::HEART_RATE_CONTROL_POINT.characteristic),
            vec![vec![0x15, 0x00, 0x01], vec![0x14, 0x05]]
        );
    }

    #[tokio::test]
    async fn test_settings_need_connection() {
        let resolver = GattResolver::new(ConnectionState::new());
        assert_eq!(
            set_measurement_interval(&resolver, 5).await,
            Err(FeatureError::Transport(
                crate::transport::TransportError::NotConnected
            ))
        );
    }
}
