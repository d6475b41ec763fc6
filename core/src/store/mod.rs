// Store module: persisted settings

pub mod backend;

pub use backend::{MemoryStorage, SledStorage, StorageBackend, StorageError};
