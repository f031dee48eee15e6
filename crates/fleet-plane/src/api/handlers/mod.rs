//! API request handlers

pub mod firmware;
pub mod ota;
pub mod provision;

pub use firmware::download_firmware;
pub use ota::{send_ota, OtaRequest, OtaResponse};
pub use provision::{
    provision, unprovision, DeviceRequest, ProvisionResponse, UnprovisionResponse,
};

use fleet_bridge::BlobStore;
use std::sync::Arc;

use crate::config::PlaneConfig;
use crate::core::{LifecycleManager, OtaDispatcher};
use crate::storage::CredentialStore;

/// Application state shared across handlers
pub struct AppState {
    /// Provision and unprovision
    pub lifecycle: LifecycleManager,
    /// OTA command dispatch
    pub dispatcher: OtaDispatcher,
    /// Credential store, for readiness reporting
    pub store: Arc<dyn CredentialStore>,
    /// Firmware store, for capability URL downloads
    pub blob_store: Arc<dyn BlobStore>,
    pub config: PlaneConfig,
}
