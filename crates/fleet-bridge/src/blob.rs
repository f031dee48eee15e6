//! Firmware blob store seam

use async_trait::async_trait;
use fleet_core::CapabilityUrl;

use crate::error::Result;

/// Durable object storage holding firmware artifacts
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the complete content of an object
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Mint a read-only capability URL for an object, valid for `ttl_seconds`
    async fn presign_get(&self, bucket: &str, key: &str, ttl_seconds: u64) -> Result<CapabilityUrl>;

    /// Read an object through a capability URL
    ///
    /// Expired or forged URLs yield `AccessDenied`.
    async fn read_presigned(&self, url: &str) -> Result<Vec<u8>>;

    /// Get a description of this store (for logging)
    fn description(&self) -> &str {
        "blob store"
    }
}
