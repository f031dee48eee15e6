//! Fleet Bridge
//!
//! The bridge defines the seams between the control plane and the managed
//! services it drives:
//!
//! - **Issuer**: certificates, the shared access policy, and device things
//! - **Blob store**: firmware artifacts and time-boxed capability URLs
//! - **Broker**: device-scoped command publishes
//! - **Trust anchor**: the root CA certificate handed to devices
//!
//! Every seam is an async trait with an in-memory backend used by tests and
//! the development server. The issuer, broker and trust anchor also have
//! HTTPS backends.
//!
//! ## Error contract
//!
//! Absent-resource conditions surface as [`BridgeError::ResourceNotFound`]
//! and nothing else, so teardown code can tolerate exactly that case.
//!
//! ## Usage
//!
//! ```ignore
//! use fleet_bridge::{backends::MemoryIssuer, CertificateIssuer};
//!
//! let issuer = MemoryIssuer::new("us-east-1", "000000000000");
//! issuer.ensure_policy("IoT_Policy", &document).await?;
//! let cert = issuer.create_keys_and_certificate(true).await?;
//! ```

pub mod backends;
pub mod blob;
pub mod broker;
pub mod error;
pub mod issuer;
pub mod trust_anchor;

pub use blob::BlobStore;
pub use broker::{validate_publish_topic, MessageBroker, QoS};
pub use error::{BridgeError, Result};
pub use issuer::{CertificateIssuer, CertificateStatus, IssuedCertificate, IssuerOp};
pub use trust_anchor::{StaticTrustAnchor, TrustAnchorSource, DEFAULT_ROOT_CA_URL};
