//! In-memory storage backend
//!
//! Default storage implementation using an in-memory hashmap.
//! Suitable for development and single-instance deployments.
//! Data is lost on restart.

use async_trait::async_trait;
use fleet_core::{DeviceCredentialRecord, DeviceId};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::info;

use super::{CredentialStore, StorageError};

/// In-memory credential store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<DeviceId, DeviceCredentialRecord>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, device_id: &DeviceId) -> Result<Option<DeviceCredentialRecord>, StorageError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(device_id).cloned())
    }

    async fn put(&self, record: DeviceCredentialRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        info!(
            device_id = %record.device_id,
            certificate_id = %record.certificate_id,
            "Storing credential record"
        );
        records.insert(record.device_id.clone(), record);
        Ok(())
    }

    async fn delete(&self, device_id: &DeviceId) -> Result<bool, StorageError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let removed = records.remove(device_id).is_some();
        if removed {
            info!(device_id = %device_id, "Deleted credential record");
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<usize, StorageError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records.len())
    }
}
