// Scripted in-process band for unit tests
//
// Exposes every attribute of the fixed table, records writes, and can answer
// writes with notification frames the way a real band answers the auth
// characteristic.

use super::gatt::{
    CacheMode, CharacteristicHandle, GattFailure, GattLink, ServiceHandle, TransportError,
    ValueChangedCallback,
};
use super::uuids::{ServiceCharacteristicKey, ALL_KEYS};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

struct ScriptedReply {
    prefix: Vec<u8>,
    reply: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    connected: bool,
    unpaired: bool,
    fail_writes: bool,
    discovery_failures: HashMap<Uuid, GattFailure>,
    discovery_queries: usize,
    values: HashMap<Uuid, Vec<u8>>,
    cached_values: HashMap<Uuid, Vec<u8>>,
    uncached_failures: HashMap<Uuid, GattFailure>,
    writes: Vec<(Uuid, Vec<u8>)>,
    notifying: HashSet<Uuid>,
    callbacks: HashMap<Uuid, ValueChangedCallback>,
    replies: HashMap<Uuid, Vec<ScriptedReply>>,
}

pub struct MockBand {
    state: Mutex<MockState>,
}

impl MockBand {
    pub const DEVICE_ID: &'static str = "mock-band-01";

    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                connected: true,
                ..MockState::default()
            }),
        }
    }

    /// Serve `value` for reads of `key`
    pub fn set_value(&self, key: ServiceCharacteristicKey, value: &[u8]) {
        self.state
            .lock()
            .values
            .insert(key.characteristic, value.to_vec());
    }

    /// Serve `value` for cached reads of `key`
    pub fn set_cached_value(&self, key: ServiceCharacteristicKey, value: &[u8]) {
        self.state
            .lock()
            .cached_values
            .insert(key.characteristic, value.to_vec());
    }

    /// Make uncached reads of `key` fail
    pub fn fail_uncached_reads(&self, key: ServiceCharacteristicKey, failure: GattFailure) {
        self.state
            .lock()
            .uncached_failures
            .insert(key.characteristic, failure);
    }

    /// Answer characteristic discovery for `characteristic` with access denied
    pub fn deny(&self, characteristic: Uuid) {
        self.fail_discovery(characteristic, GattFailure::AccessDenied);
    }

    pub fn fail_discovery(&self, characteristic: Uuid, failure: GattFailure) {
        self.state
            .lock()
            .discovery_failures
            .insert(characteristic, failure);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn set_connected(&self, connected: bool) {
        self.state.lock().connected = connected;
    }

    /// When a write to `characteristic` starts with `prefix`, notify `reply`
    /// from that characteristic.
    pub fn reply_to(&self, characteristic: Uuid, prefix: &[u8], reply: &[u8]) {
        self.state
            .lock()
            .replies
            .entry(characteristic)
            .or_default()
            .push(ScriptedReply {
                prefix: prefix.to_vec(),
                reply: reply.to_vec(),
            });
    }

    /// Deliver a notification from `characteristic` to its handler
    pub fn notify(&self, characteristic: Uuid, value: &[u8]) -> bool {
        self.emit(characteristic, characteristic, value)
    }

    /// Invoke the handler registered on `registered` with `source` as the
    /// reported origin. Returns false if no handler is registered.
    pub fn emit(&self, registered: Uuid, source: Uuid, value: &[u8]) -> bool {
        let callback = self.state.lock().callbacks.get(&registered).cloned();
        match callback {
            Some(callback) => {
                callback(source, value.to_vec());
                true
            }
            None => false,
        }
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.state.lock().writes.clone()
    }

    pub fn writes_to(&self, characteristic: Uuid) -> Vec<Vec<u8>> {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|(uuid, _)| *uuid == characteristic)
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub fn is_notifying(&self, characteristic: Uuid) -> bool {
        self.state.lock().notifying.contains(&characteristic)
    }

    pub fn has_handler(&self, characteristic: Uuid) -> bool {
        self.state.lock().callbacks.contains_key(&characteristic)
    }

    pub fn discovery_queries(&self) -> usize {
        self.state.lock().discovery_queries
    }

    pub fn is_unpaired(&self) -> bool {
        self.state.lock().unpaired
    }
}

impl Default for MockBand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GattLink for MockBand {
    fn device_id(&self) -> String {
        Self::DEVICE_ID.to_string()
    }

    async fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    async fn services_for_uuid(&self, service: Uuid) -> Result<Vec<ServiceHandle>, GattFailure> {
        if !self.state.lock().connected {
            return Err(GattFailure::Unreachable);
        }
        let exists = ALL_KEYS.iter().any(|key| key.service == service);
        Ok(if exists {
            vec![ServiceHandle { uuid: service }]
        } else {
            Vec::new()
        })
    }

    async fn characteristics(
        &self,
        service: &ServiceHandle,
        filter: Option<Uuid>,
    ) -> Result<Vec<CharacteristicHandle>, GattFailure> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(GattFailure::Unreachable);
        }
        state.discovery_queries += 1;

        if let Some(uuid) = filter {
            if let Some(failure) = state.discovery_failures.get(&uuid) {
                return Err(*failure);
            }
        }

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
        cache: CacheMode,
    ) -> Result<Vec<u8>, GattFailure> {
        let state = self.state.lock();
        if !state.connected {
            return Err(GattFailure::Unreachable);
        }
        match cache {
            CacheMode::Uncached => {
                if let Some(failure) = state.uncached_failures.get(&characteristic.uuid) {
                    return Err(*failure);
                }
                Ok(state
                    .values
                    .get(&characteristic.uuid)
                    .cloned()
                    .unwrap_or_default())
            }
            CacheMode::Cached => Ok(state
                .cached_values
                .get(&characteristic.uuid)
                .or_else(|| state.values.get(&characteristic.uuid))
                .cloned()
                .unwrap_or_default()),
        }
    }

    async fn write(
        &self,
        characteristic: &CharacteristicHandle,
        value: &[u8],
    ) -> Result<(), GattFailure> {
        let (callback, reply) = {
            let mut state = self.state.lock();
            if !state.connected {
                return Err(GattFailure::Unreachable);
            }
            if state.fail_writes {
                return Err(GattFailure::ProtocolError);
            }
            state.writes.push((characteristic.uuid, value.to_vec()));

            let reply = state
                .replies
                .get(&characteristic.uuid)
                .and_then(|replies| replies.iter().find(|r| value.starts_with(&r.prefix)))
                .map(|r| r.reply.clone());
            let callback = state.callbacks.get(&characteristic.uuid).cloned();
            (callback, reply)
        };

        // Handlers run outside the lock, like a platform notification thread.
        if let (Some(callback), Some(reply)) = (callback, reply) {
            callback(characteristic.uuid, reply);
        }
        Ok(())
    }

    async fn enable_notifications(
        &self,
        characteristic: &CharacteristicHandle,
    ) -> Result<(), GattFailure> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(GattFailure::Unreachable);
        }
        state.notifying.insert(characteristic.uuid);
        Ok(())
    }

    fn set_on_value_changed(
        &self,
        characteristic: &CharacteristicHandle,
        callback: ValueChangedCallback,
    ) -> Result<(), GattFailure> {
        let previous = self
            .state
            .lock()
            .callbacks
            .insert(characteristic.uuid, callback);
        // Dropped after the lock is released.
        drop(previous);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.connected = false;
        state.callbacks.clear();
        Ok(())
    }

    async fn unpair(&self) -> Result<(), TransportError> {
        self.state.lock().unpaired = true;
        Ok(())
    }
}
