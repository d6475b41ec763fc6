//! Connection state owned by the SDK root
//!
//! `ConnectionState` holds at most one live [`Connection`]. It is cheap to
//! clone; every clone observes the same slot, so the root context and the
//! resolver see connect/disconnect at the same time.

use super::gatt::GattLink;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// Handle to the active link with a band
#[derive(Clone)]
pub struct Connection {
    link: Arc<dyn GattLink>,
}

impl Connection {
    pub fn new(link: Arc<dyn GattLink>) -> Self {
        Self { link }
    }

    /// The platform link backing this connection
    pub fn link(&self) -> &Arc<dyn GattLink> {
        &self.link
    }

    pub fn device_id(&self) -> String {
        self.link.device_id()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("device_id", &self.link.device_id())
            .finish()
    }
}

/// Slot for the single active connection
#[derive(Clone, Default)]
pub struct ConnectionState {
    current: Arc<RwLock<Option<Connection>>>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a connection, returning the one it replaced
    pub fn set(&self, connection: Connection) -> Option<Connection> {
        self.current.write().replace(connection)
    }

    /// Remove the connection, returning it
    pub fn clear(&self) -> Option<Connection> {
        self.current.write().take()
    }

    /// Snapshot of the current connection
    pub fn current(&self) -> Option<Connection> {
        self.current.read().clone()
    }

    pub fn is_present(&self) -> bool {
        self.current.read().is_some()
    }
}
