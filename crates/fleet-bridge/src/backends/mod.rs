//! Collaborator backends

pub mod http;
pub mod http_issuer;
pub mod memory_blob;
pub mod memory_broker;
pub mod memory_issuer;

pub use http::{HttpBroker, HttpTrustAnchorSource, HTTP_TIMEOUT};
pub use http_issuer::HttpIssuer;
pub use memory_blob::{BlobOp, MemoryBlobStore};
pub use memory_broker::{MemoryBroker, PublishedMessage};
pub use memory_issuer::MemoryIssuer;
