//! Error types for collaborator calls

use fleet_core::CoreError;
use thiserror::Error;

/// Result type for collaborator operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors reported by external collaborators
///
/// `ResourceNotFound` is the one absent-resource condition. Teardown logic
/// matches on it through [`BridgeError::is_resource_not_found`] and treats
/// every other variant as a hard failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The addressed resource does not exist
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// A resource with this name already exists
    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    /// The collaborator refused the request as malformed or in the wrong state
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A capability was expired, forged, or issued by another signer
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The collaborator rejected the request (e.g. broker refused a publish)
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The collaborator could not be reached or is throttling
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Whether this error means the resource is already gone
    pub fn is_resource_not_found(&self) -> bool {
        matches!(self, BridgeError::ResourceNotFound(_))
    }

    /// Whether this error means the resource already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, BridgeError::ResourceAlreadyExists(_))
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            BridgeError::Unavailable(err.to_string())
        } else {
            BridgeError::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for BridgeError {
    fn from(err: url::ParseError) -> Self {
        BridgeError::InvalidRequest(format!("Invalid URL: {}", err))
    }
}

impl From<CoreError> for BridgeError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::CapabilityExpired(_) | CoreError::CapabilityInvalid(_) => {
                BridgeError::AccessDenied(err.to_string())
            }
            _ => BridgeError::Internal(err.to_string()),
        }
    }
}
