//! Error types for the fleet core crate

use thiserror::Error;

/// Result type alias using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in core domain operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Device identifier missing or empty
    #[error("Missing device ID")]
    MissingDeviceId,

    /// Command field missing or empty
    #[error("Missing command")]
    MissingCommand,

    /// Command is not one the dispatcher understands
    #[error("Not a OTA command: {0}")]
    UnsupportedCommand(String),

    /// Capability URL is past its expiry
    #[error("Capability expired at {0}")]
    CapabilityExpired(String),

    /// Capability URL is malformed, signed by another key, or tampered with
    #[error("Invalid capability: {0}")]
    CapabilityInvalid(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<url::ParseError> for CoreError {
    fn from(err: url::ParseError) -> Self {
        CoreError::CapabilityInvalid(err.to_string())
    }
}
