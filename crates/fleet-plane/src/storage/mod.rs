//! Credential storage for the control plane
//!
//! The credential store maps each device to the credentials issued to it.
//! The in-memory backend is the default; the PostgreSQL backend (feature
//! `postgres`) survives restarts and can be shared by several instances.
//!
//! Writes are unconditional upserts. Two concurrent first-time provisions of
//! the same device both write, and the last writer wins.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use fleet_core::{DeviceCredentialRecord, DeviceId};
use std::fmt::Debug;

/// Error type for storage operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Durable keyed storage of device credential records
///
/// Implementations must be thread-safe and give read-after-write
/// consistency to a single caller.
#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// Look up the record for a device
    async fn get(&self, device_id: &DeviceId) -> Result<Option<DeviceCredentialRecord>, StorageError>;

    /// Insert or replace the record for `record.device_id`
    async fn put(&self, record: DeviceCredentialRecord) -> Result<(), StorageError>;

    /// Delete the record for a device, returning whether one existed
    async fn delete(&self, device_id: &DeviceId) -> Result<bool, StorageError>;

    /// Number of stored records
    async fn count(&self) -> Result<usize, StorageError>;
}
