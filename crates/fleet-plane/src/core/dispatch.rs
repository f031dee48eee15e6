//! OTA command dispatch
//!
//! A dispatch reads the firmware artifact, computes its CRC-32, mints a
//! capability URL for it, and publishes the command to the device's topic.
//! Nothing is published unless the first three steps succeed.
//!
//! The artifact lives under one fixed key with no version. A re-upload
//! between dispatch and the device's fetch makes the device see a checksum
//! mismatch.

use chrono::{DateTime, Utc};
use fleet_bridge::{BlobStore, MessageBroker, QoS};
use fleet_core::{firmware_crc32, DeviceId, OtaCommand, OtaCommandMessage};
use std::sync::Arc;
use tracing::{error, info};

use super::error::OperationError;
use crate::config::FIRMWARE_URL_TTL_SECS;

/// Where the current firmware artifact is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareLocation {
    pub bucket: String,
    pub key: String,
}

impl FirmwareLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// What was sent, returned for display and audit only
///
/// Delivery to the device is not confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub device_id: DeviceId,
    pub topic: String,
    pub fw_url: String,
    pub fw_crc: u32,
    pub fw_url_expires_at: DateTime<Utc>,
}

/// Publishes firmware update commands to devices
pub struct OtaDispatcher {
    blob_store: Arc<dyn BlobStore>,
    broker: Arc<dyn MessageBroker>,
    firmware: FirmwareLocation,
    topic_base: String,
}

impl OtaDispatcher {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        broker: Arc<dyn MessageBroker>,
        firmware: FirmwareLocation,
        topic_base: impl Into<String>,
    ) -> Self {
        Self {
            blob_store,
            broker,
            firmware,
            topic_base: topic_base.into(),
        }
    }

    pub fn firmware(&self) -> &FirmwareLocation {
        &self.firmware
    }

    /// Command topic of a device
    pub fn topic_for(&self, device_id: &DeviceId) -> String {
        format!("{}/{}", self.topic_base.trim_end_matches('/'), device_id)
    }

    /// Validate raw request fields, then dispatch
    ///
    /// Both fields are required. The command must be `ota` in any case.
    pub async fn dispatch_request(
        &self,
        device_id: Option<&str>,
        command: Option<&str>,
    ) -> Result<DispatchReceipt, OperationError> {
        let device_id = DeviceId::from_field(device_id)?;
        let command = OtaCommand::from_field(command)?;
        self.dispatch(&device_id, command).await
    }

    /// Send the current firmware to a device
    ///
    /// The device does not need to be provisioned.
    pub async fn dispatch(
        &self,
        device_id: &DeviceId,
        command: OtaCommand,
    ) -> Result<DispatchReceipt, OperationError> {
        let FirmwareLocation { bucket, key } = &self.firmware;

        let prepare_failed = |e: &dyn std::fmt::Display| {
            error!(device_id = %device_id, bucket = %bucket, key = %key, error = %e, "Failed to prepare OTA data");
            OperationError::PreparationFailed(e.to_string())
        };

        let firmware = self
            .blob_store
            .get_object(bucket, key)
            .await
            .map_err(|e| prepare_failed(&e))?;
        let fw_crc = firmware_crc32(&firmware);

        let capability = self
            .blob_store
            .presign_get(bucket, key, FIRMWARE_URL_TTL_SECS)
            .await
            .map_err(|e| prepare_failed(&e))?;

        let message = OtaCommandMessage::new(capability.url.clone(), fw_crc);
        let payload = message.to_payload().map_err(|e| prepare_failed(&e))?;

        info!(
            device_id = %device_id,
            command = %command,
            size = firmware.len(),
            fw_crc = fw_crc,
            expires_at = %capability.expires_at,
            "Prepared OTA command"
        );

        let topic = self.topic_for(device_id);
        self.broker
            .publish(&topic, QoS::AtLeastOnce, payload)
            .await
            .map_err(|e| {
                error!(device_id = %device_id, topic = %topic, error = %e, "Failed to publish OTA command");
                OperationError::PublishFailed(e.to_string())
            })?;

        info!(device_id = %device_id, topic = %topic, "OTA command published");

        Ok(DispatchReceipt {
            device_id: device_id.clone(),
            topic,
            fw_url: capability.url,
            fw_crc,
            fw_url_expires_at: capability.expires_at,
        })
    }
}
