//! Root certificate authority source

use async_trait::async_trait;

use crate::error::{BridgeError, Result};

/// Public root CA certificate URL used by default
pub const DEFAULT_ROOT_CA_URL: &str = "https://www.amazontrust.com/repository/AmazonRootCA1.pem";

/// Source of the broker's root CA certificate, returned to devices as-is
#[async_trait]
pub trait TrustAnchorSource: Send + Sync {
    /// Fetch the root CA certificate as PEM text
    async fn fetch_root_ca(&self) -> Result<String>;

    /// Get a description of this source (for logging)
    fn description(&self) -> &str {
        "trust anchor source"
    }
}

/// Trust anchor with a fixed certificate
#[derive(Debug, Clone)]
pub struct StaticTrustAnchor {
    pem: String,
}

impl StaticTrustAnchor {
    /// Create a source that always returns `pem`
    pub fn new(pem: impl Into<String>) -> Self {
        Self { pem: pem.into() }
    }
}

#[async_trait]
impl TrustAnchorSource for StaticTrustAnchor {
    async fn fetch_root_ca(&self) -> Result<String> {
        if self.pem.is_empty() {
            return Err(BridgeError::Internal("no root CA configured".into()));
        }
        Ok(self.pem.clone())
    }

    fn description(&self) -> &str {
        "static trust anchor"
    }
}
