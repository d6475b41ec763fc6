// Scripted band link shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bandlink_core::transport::uuids::ALL_KEYS;
use bandlink_core::{
    CacheMode, CharacteristicHandle, GattFailure, GattLink, ServiceHandle, TransportError,
    ValueChangedCallback,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

pub const AUTH_CHAR: Uuid = bandlink_core::transport::uuids::AUTH.characteristic;

#[derive(Default)]
struct State {
    disconnected: bool,
    writes: Vec<Vec<u8>>,
    replies: Vec<(Vec<u8>, Vec<u8>)>,
    values: HashMap<Uuid, Vec<u8>>,
    callback: Option<ValueChangedCallback>,
}

/// Band that answers auth writes from a prefix → reply script
#[derive(Default)]
pub struct ScriptedBand {
    state: Mutex<State>,
}

impl ScriptedBand {
    pub fn new() -> Self {
        Self::default()
    }

    /// Band that completes the whole handshake
    pub fn cooperative(challenge: [u8; 16]) -> Self {
        let band = Self::new();
        band.reply(&[0x01, 0x08], &[0x10, 0x01, 0x01]);
        let mut challenge_frame = vec![0x10, 0x02, 0x01];
        challenge_frame.extend_from_slice(&challenge);
        band.reply(&[0x02, 0x08], &challenge_frame);
        band.reply(&[0x03, 0x08], &[0x10, 0x03, 0x01]);
        band
    }

    pub fn reply(&self, prefix: &[u8], reply: &[u8]) {
        self.state
            .lock()
            .replies
            .push((prefix.to_vec(), reply.to_vec()));
    }

    pub fn set_value(&self, characteristic: Uuid, value: &[u8]) {
        self.state
            .lock()
            .values
            .insert(characteristic, value.to_vec());
    }

    pub fn auth_writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }
}

#[async_trait]
impl GattLink for ScriptedBand {
    fn device_id(&self) -> String {
        "scripted-band".to_string()
    }

    async fn is_connected(&self) -> bool {
        !self.state.lock().disconnected
    }

    async fn services_for_uuid(&self, service: Uuid) -> Result<Vec<ServiceHandle>, GattFailure> {
        Ok(ALL_KEYS
            .iter()
            .find(|key| key.service == service)
            .map(|key| vec![ServiceHandle { uuid: key.service }])
            .unwrap_or_default())
    }

    async fn characteristics(
        &self,
        service: &ServiceHandle,
        filter: Option<Uuid>,
    ) -> Result<Vec<CharacteristicHandle>, GattFailure> {
        Ok(ALL_KEYS
            .iter()
            .filter(|key| key.service == service.uuid)
            .filter(|key| filter.map_or(true, |uuid| uuid == key.characteristic))
            .map(|key| CharacteristicHandle {
                service: key.service,
                uuid: key.characteristic,
            })
            .collect())
    }

    async fn read(
        &self,
        characteristic: &CharacteristicHandle,
        _cache: CacheMode,
    ) -> Result<Vec<u8>, GattFailure> {
        Ok(self
            .state
            .lock()
            .values
            .get(&characteristic.uuid)
            .cloned()
            .unwrap_or_default())
    }

    async fn write(
        &self,
        characteristic: &CharacteristicHandle,
        value: &[u8],
    ) -> Result<(), GattFailure> {
        let (callback, reply) = {
            let mut state = self.state.lock();
            if characteristic.uuid != AUTH_CHAR {
                return Ok(());
            }
            state.writes.push(value.to_vec());
            let reply = state
                .replies
                .iter()
                .find(|(prefix, _)| value.starts_with(prefix))
                .map(|(_, reply)| reply.clone());
            (state.callback.clone(), reply)
        };

        if let (Some(callback), Some(reply)) = (callback, reply) {
            callback(AUTH_CHAR, reply);
        }
        Ok(())
    }

    async fn enable_notifications(
        &self,
        _characteristic: &CharacteristicHandle,
    ) -> Result<(), GattFailure> {
        Ok(())
    }

    fn set_on_value_changed(
        &self,
        characteristic: &CharacteristicHandle,
        callback: ValueChangedCallback,
    ) -> Result<(), GattFailure> {
        if characteristic.uuid == AUTH_CHAR {
            let previous = self.state.lock().callback.replace(callback);
            drop(previous);
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.disconnected = true;
        state.callback = None;
        Ok(())
    }

    async fn unpair(&self) -> Result<(), TransportError> {
        Ok(())
    }
}
