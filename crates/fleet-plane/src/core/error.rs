//! Operation errors surfaced by the lifecycle manager and dispatcher
//!
//! Every collaborator failure is translated into one of these kinds at the
//! operation boundary. The collaborator's message is kept for operators.

use fleet_core::CoreError;
use thiserror::Error;

/// Failure of a lifecycle or dispatch operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Missing or malformed input
    #[error("{0}")]
    InvalidRequest(String),

    /// Unprovision of a device with no credential record
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Command other than `ota`
    #[error("Not a OTA command: {0}")]
    UnsupportedCommand(String),

    #[error("Failed to provision device: {0}")]
    ProvisionFailed(String),

    #[error("Failed to unprovision device: {0}")]
    UnprovisionFailed(String),

    /// Checksum or capability minting failed; nothing was published
    #[error("Failed to prepare OTA data: {0}")]
    PreparationFailed(String),

    /// The broker refused the command message
    #[error("Failed to publish command message: {0}")]
    PublishFailed(String),
}

impl OperationError {
    /// Machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            OperationError::InvalidRequest(_) => "INVALID_REQUEST",
            OperationError::NotFound(_) => "NOT_FOUND",
            OperationError::UnsupportedCommand(_) => "UNSUPPORTED_COMMAND",
            OperationError::ProvisionFailed(_) => "PROVISION_FAILED",
            OperationError::UnprovisionFailed(_) => "UNPROVISION_FAILED",
            OperationError::PreparationFailed(_) => "PREPARATION_FAILED",
            OperationError::PublishFailed(_) => "PUBLISH_FAILED",
        }
    }
}

/// Request validation errors from the domain types
impl From<CoreError> for OperationError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnsupportedCommand(command) => OperationError::UnsupportedCommand(command),
            other => OperationError::InvalidRequest(other.to_string()),
        }
    }
}
