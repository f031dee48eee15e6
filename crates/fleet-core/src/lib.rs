//! # Fleet Core
//!
//! Core types and integrity primitives for the fleet control plane.
//!
//! ## Key Concepts
//!
//! - **Device credential record**: the certificate handles and key material
//!   issued to one device, keyed by device id
//! - **Access policy**: the single fleet-wide policy attached to every device
//!   certificate
//! - **OTA command**: the message telling a device to fetch and apply firmware,
//!   carrying a capability URL and a CRC-32 of the image
//! - **Capability URL**: a signed, time-boxed URL granting read access to one
//!   firmware object

pub mod capability;
pub mod checksum;
pub mod error;
pub mod policy;
pub mod types;

pub use capability::{CapabilityUrl, UrlSigner, VerifiedCapability};
pub use checksum::firmware_crc32;
pub use error::{CoreError, Result};
pub use policy::{AccessPolicy, DEFAULT_POLICY_NAME};
pub use types::{CredentialBundle, DeviceCredentialRecord, DeviceId, OtaCommand, OtaCommandMessage};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
