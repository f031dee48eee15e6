//! Provisioning handlers

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use fleet_core::DeviceId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::AppState;
use crate::api::error::ApiError;
use crate::core::OperationError;

/// Request naming a device
#[derive(Debug, Deserialize)]
pub struct DeviceRequest {
    pub device_id: Option<String>,
}

impl DeviceRequest {
    fn device_id(&self) -> Result<DeviceId, OperationError> {
        Ok(DeviceId::from_field(self.device_id.as_deref())?)
    }
}

/// Credentials returned to a provisioned device
#[derive(Debug, Serialize)]
pub struct ProvisionResponse {
    pub message: String,
    pub root_ca: String,
    pub device_cert: String,
    pub private_key: String,
    pub public_key: String,
}

/// Response from unprovisioning
#[derive(Debug, Serialize)]
pub struct UnprovisionResponse {
    pub message: String,
}

/// Provision a device, or return its existing credentials
///
/// POST /provisioning
pub async fn provision(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Result<Json<ProvisionResponse>, ApiError> {
    let Json(request) = payload?;
    let device_id = request.device_id()?;

    let outcome = state.lifecycle.provision(&device_id).await?;

    let message = if outcome.newly_issued {
        "Device provisioned successfully"
    } else {
        "Device already provisioned"
    };
    info!(device_id = %device_id, newly_issued = outcome.newly_issued, "Provision request served");

    let bundle = outcome.bundle;
    Ok(Json(ProvisionResponse {
        message: message.into(),
        root_ca: bundle.root_ca,
        device_cert: bundle.device_cert,
        private_key: bundle.private_key,
        public_key: bundle.public_key,
    }))
}

/// Tear down a device's credentials
///
/// POST /unprovisioning
pub async fn unprovision(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeviceRequest>, JsonRejection>,
) -> Result<Json<UnprovisionResponse>, ApiError> {
    let Json(request) = payload?;
    let device_id = request.device_id()?;

    state.lifecycle.unprovision(&device_id).await?;

    Ok(Json(UnprovisionResponse {
        message: "Device unprovisioned successfully".into(),
    }))
}
