//! Common types used across the fleet control plane

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Identifier of a managed device
///
/// Validated for presence only: any non-empty string is accepted. The same
/// value names the device's identity entity in the issuer and the last
/// segment of its command topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier, rejecting empty input
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() {
            return Err(CoreError::MissingDeviceId);
        }
        Ok(Self(value))
    }

    /// Parse an optional request field into a device identifier
    pub fn from_field(value: Option<&str>) -> Result<Self> {
        match value {
            Some(v) => Self::new(v),
            None => Err(CoreError::MissingDeviceId),
        }
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Credentials issued to a device, as persisted in the credential store
///
/// At most one record exists per device. Its presence means the certificate
/// and its policy attachment exist in the issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCredentialRecord {
    /// Device this record belongs to (unique key)
    pub device_id: DeviceId,

    /// Issuer-assigned certificate identifier
    pub certificate_id: String,

    /// Opaque certificate handle used for policy and principal attach/detach
    pub certificate_arn: String,

    /// Public trust anchor the device uses to authenticate the broker
    pub root_ca: String,

    /// PEM-encoded device certificate
    pub device_cert: String,

    /// PEM-encoded private key
    pub private_key: String,

    /// PEM-encoded public key
    pub public_key: String,
}

impl DeviceCredentialRecord {
    /// The bundle handed back to the device
    pub fn bundle(&self) -> CredentialBundle {
        CredentialBundle {
            root_ca: self.root_ca.clone(),
            device_cert: self.device_cert.clone(),
            private_key: self.private_key.clone(),
            public_key: self.public_key.clone(),
        }
    }
}

/// The credential set returned to a provisioned device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    pub root_ca: String,
    pub device_cert: String,
    pub private_key: String,
    pub public_key: String,
}

/// Commands the dispatcher knows how to deliver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OtaCommand {
    /// Firmware update
    Ota,
}

impl OtaCommand {
    /// Wire literal of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            OtaCommand::Ota => "ota",
        }
    }

    /// Parse an optional request field. Matching is case-insensitive.
    pub fn from_field(value: Option<&str>) -> Result<Self> {
        match value {
            None | Some("") => Err(CoreError::MissingCommand),
            Some(v) => v.parse(),
        }
    }
}

impl fmt::Display for OtaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OtaCommand {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ota" => Ok(OtaCommand::Ota),
            _ => Err(CoreError::UnsupportedCommand(s.to_string())),
        }
    }
}

/// Message published to a device's command topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtaCommandMessage {
    /// Always `"ota"`
    pub command: OtaCommand,

    /// Time-boxed capability URL for the firmware artifact
    pub fw_url: String,

    /// CRC-32 of the artifact at dispatch time
    pub fw_crc: u32,
}

impl OtaCommandMessage {
    /// Build an OTA command for the given artifact URL and checksum
    pub fn new(fw_url: impl Into<String>, fw_crc: u32) -> Self {
        Self {
            command: OtaCommand::Ota,
            fw_url: fw_url.into(),
            fw_crc,
        }
    }

    /// Serialize to the JSON payload sent over the broker
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(CoreError::from)
    }

    /// Deserialize from a broker payload
    pub fn from_payload(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(CoreError::from)
    }
}
