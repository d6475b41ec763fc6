// Persisted authorization flag

use crate::store::{MemoryStorage, StorageBackend, StorageError};
use std::sync::Arc;
use tracing::{info, warn};

/// Storage key of the flag
pub const AUTHORIZED_KEY: &str = "isAuthorized";

/// Durable record that the band has accepted our key at least once.
///
/// Reads and writes are not transactional; concurrent handshakes may race.
#[derive(Clone)]
pub struct AuthorizationFlag {
    backend: Arc<dyn StorageBackend>,
}

impl AuthorizationFlag {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Current value. Unreadable storage counts as not authorized.
    pub fn is_set(&self) -> bool {
        match self.backend.get(AUTHORIZED_KEY.as_bytes()) {
            Ok(Some(value)) => value.first().copied().unwrap_or(0) != 0,
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to read authorization flag: {}", e);
                false
            }
        }
    }

    pub fn set(&self) -> Result<(), StorageError> {
        self.backend.put(AUTHORIZED_KEY.as_bytes(), &[1])?;
        self.backend.flush()?;
        info!("Band authorization stored");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.remove(AUTHORIZED_KEY.as_bytes())?;
        self.backend.flush()?;
        info!("Band authorization cleared");
        Ok(())
    }
}
