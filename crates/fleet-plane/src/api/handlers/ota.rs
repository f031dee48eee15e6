//! OTA dispatch handler

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::AppState;
use crate::api::error::ApiError;

/// Request to send a command to a device
#[derive(Debug, Deserialize)]
pub struct OtaRequest {
    pub device_id: Option<String>,
    pub command: Option<String>,
}

/// Summary of the dispatched command
#[derive(Debug, Serialize)]
pub struct OtaResponse {
    pub message: String,
    pub device_id: String,
    pub topic: String,
    pub fw_url: String,
    pub fw_crc: u32,
    pub fw_url_expires_at: DateTime<Utc>,
}

/// Send the current firmware to a device
///
/// POST /ota
pub async fn send_ota(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<OtaRequest>, JsonRejection>,
) -> Result<Json<OtaResponse>, ApiError> {
    let Json(request) = payload?;

    let receipt = state
        .dispatcher
        .dispatch_request(request.device_id.as_deref(), request.command.as_deref())
        .await?;

    Ok(Json(OtaResponse {
        message: "OTA command sent successfully".into(),
        device_id: receipt.device_id.to_string(),
        topic: receipt.topic,
        fw_url: receipt.fw_url,
        fw_crc: receipt.fw_crc,
        fw_url_expires_at: receipt.fw_url_expires_at,
    }))
}
