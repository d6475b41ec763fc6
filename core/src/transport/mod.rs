// Transport module: GATT link, connection state and attribute resolution

pub mod connection;
pub mod gatt;
#[cfg(test)]
pub mod mock;
pub mod resolver;
pub mod uuids;

pub use connection::{Connection, ConnectionState};
pub use gatt::{
    CacheMode, CharacteristicHandle, GattFailure, GattLink, ServiceHandle, TransportError,
    ValueChangedCallback,
};
pub use resolver::{GattResolver, Resolution};
pub use uuids::ServiceCharacteristicKey;
