//! Fleet Control Plane Server
//!
//! The control plane manages device identities and firmware updates for a
//! fleet of embedded devices:
//! - Provisions devices with a certificate bound to the shared access policy
//! - Unprovisions devices with an absent-tolerant teardown
//! - Dispatches OTA commands carrying a CRC-32 and a time-boxed firmware URL
//!
//! ## Guarantees
//!
//! 1. **Idempotent provisioning**: a provisioned device gets its stored
//!    credentials back and no new certificate is issued
//! 2. **Resumable teardown**: the credential record is removed only after
//!    every issuer resource is gone, so a failed unprovision can be retried
//! 3. **Publish gating**: no command is published unless its checksum and
//!    capability URL were both prepared
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with device count
//! - `POST /provisioning` - Provision a device
//! - `POST /unprovisioning` - Unprovision a device
//! - `POST /ota` - Send an OTA command to a device
//! - `GET /v1/firmware/{bucket}/{key}` - Download firmware with a capability URL
//! - `OPTIONS` on any path - CORS preflight, answered by the CORS layer

pub mod api;
pub mod config;
pub mod core;
pub mod storage;

pub use api::create_router;
pub use api::handlers::AppState;
pub use config::{ConfigError, PlaneConfig, FIRMWARE_URL_TTL_SECS};
pub use crate::core::{
    DispatchReceipt, FirmwareLocation, LifecycleManager, OperationError, OtaDispatcher,
    ProvisionOutcome,
};
pub use storage::{CredentialStore, MemoryStore, StorageError};
