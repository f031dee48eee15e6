//! In-memory blob store backend
//!
//! Holds objects in a map and signs capability URLs with a [`UrlSigner`].
//! Suitable for tests and single-instance development deployments.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use fleet_core::{CapabilityUrl, UrlSigner};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::blob::BlobStore;
use crate::error::{BridgeError, Result};

/// Blob store operations, used for fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobOp {
    GetObject,
    PresignGet,
    ReadPresigned,
}

/// In-memory blob store
#[derive(Debug)]
pub struct MemoryBlobStore {
    endpoint: String,
    signer: UrlSigner,
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    faults: RwLock<HashMap<BlobOp, BridgeError>>,
}

impl MemoryBlobStore {
    /// Create an empty store whose capability URLs point at `endpoint`
    pub fn new(endpoint: impl Into<String>, signer: UrlSigner) -> Self {
        Self {
            endpoint: endpoint.into(),
            signer,
            objects: RwLock::new(HashMap::new()),
            faults: RwLock::new(HashMap::new()),
        }
    }

    /// Store or replace an object
    pub fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>) {
        info!(bucket = %bucket, key = %key, size = data.len(), "Stored object");
        write(&self.objects).insert((bucket.to_string(), key.to_string()), data);
    }

    /// Remove an object
    pub fn remove_object(&self, bucket: &str, key: &str) -> bool {
        write(&self.objects)
            .remove(&(bucket.to_string(), key.to_string()))
            .is_some()
    }

    /// Whether an object exists
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        read(&self.objects).contains_key(&(bucket.to_string(), key.to_string()))
    }

    /// Make the next call to `op` fail with `error`
    pub fn fail_on(&self, op: BlobOp, error: BridgeError) {
        write(&self.faults).insert(op, error);
    }

    /// Read through a capability URL as of `now`
    pub fn read_presigned_at(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<u8>> {
        self.take_fault(BlobOp::ReadPresigned)?;

        let capability = self.signer.verify(url, now).map_err(|e| {
            warn!(error = %e, "Rejected capability URL");
            BridgeError::from(e)
        })?;

        debug!(bucket = %capability.bucket, key = %capability.key, "Capability accepted");
        self.lookup(&capability.bucket, &capability.key)
    }

    fn lookup(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        read(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| BridgeError::ResourceNotFound(format!("{}/{}", bucket, key)))
    }

    fn take_fault(&self, op: BlobOp) -> Result<()> {
        match write(&self.faults).remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.take_fault(BlobOp::GetObject)?;
        self.lookup(bucket, key)
    }

    async fn presign_get(&self, bucket: &str, key: &str, ttl_seconds: u64) -> Result<CapabilityUrl> {
        self.take_fault(BlobOp::PresignGet)?;

        let ttl = i64::try_from(ttl_seconds)
            .map(Duration::seconds)
            .map_err(|_| BridgeError::InvalidRequest(format!("ttl too large: {}", ttl_seconds)))?;

        let capability = self
            .signer
            .mint(&self.endpoint, bucket, key, ttl, Utc::now())?;

        debug!(
            bucket = %bucket,
            key = %key,
            expires_at = %capability.expires_at,
            "Minted capability URL"
        );
        Ok(capability)
    }

    async fn read_presigned(&self, url: &str) -> Result<Vec<u8>> {
        self.read_presigned_at(url, Utc::now())
    }

    fn description(&self) -> &str {
        "in-memory blob store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKET: &str = "esp32-firmware-storage";
    const KEY: &str = "iot_esp32_ota.bin";

    fn store() -> MemoryBlobStore {
        let store = MemoryBlobStore::new(
            "http://localhost:8080/v1/firmware",
            UrlSigner::from_bytes("blob-test", &[3u8; 32]),
        );
        store.put_object(BUCKET, KEY, b"firmware-image".to_vec());
        store
    }

    #[tokio::test]
    async fn test_get_object() {
        let store = store();
        assert_eq!(store.get_object(BUCKET, KEY).await.unwrap(), b"firmware-image");

        let err = store.get_object(BUCKET, "missing.bin").await.unwrap_err();
        assert!(err.is_resource_not_found());
    }

    #[tokio::test]
    async fn test_capability_window_contract() {
        let store = store();
        let cap = store.presign_get(BUCKET, KEY, 120).await.unwrap();

        assert_eq!((cap.expires_at - cap.issued_at).num_seconds(), 120);

        let inside = cap.expires_at - Duration::seconds(1);
        assert_eq!(store.read_presigned_at(&cap.url, inside).unwrap(), b"firmware-image");

        let after = cap.expires_at + Duration::seconds(1);
        assert!(matches!(
            store.read_presigned_at(&cap.url, after),
            Err(BridgeError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_capability_does_not_cover_other_objects() {
        let store = store();
        store.put_object(BUCKET, "other.bin", b"other".to_vec());

        let cap = store.presign_get(BUCKET, KEY, 120).await.unwrap();
        let forged = cap.url.replace(KEY, "other.bin");

        assert!(matches!(
            store.read_presigned(&forged).await,
            Err(BridgeError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_nested_key_readable_through_capability() {
        let store = store();
        store.put_object(BUCKET, "releases/v2.bin", b"nested-image".to_vec());

        let cap = store.presign_get(BUCKET, "releases/v2.bin", 120).await.unwrap();

        assert_eq!(store.read_presigned(&cap.url).await.unwrap(), b"nested-image");
    }

    #[tokio::test]
    async fn test_presign_fault() {
        let store = store();
        store.fail_on(BlobOp::PresignGet, BridgeError::Unavailable("signer offline".into()));

        assert!(store.presign_get(BUCKET, KEY, 120).await.is_err());
        assert!(store.presign_get(BUCKET, KEY, 120).await.is_ok());
    }
}
