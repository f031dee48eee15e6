//! Firmware download through capability URLs

use axum::{
    extract::{Path, State},
    http::{header, Uri},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::AppState;
use crate::api::error::ApiError;

/// Serve a firmware object to the holder of a valid capability URL
///
/// GET /v1/firmware/{bucket}/{key}
pub async fn download_firmware(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    uri: Uri,
) -> Result<impl IntoResponse, ApiError> {
    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    let url = format!("{}{}", state.config.public_url.trim_end_matches('/'), path_and_query);

    let data = state.blob_store.read_presigned(&url).await.map_err(|e| {
        warn!(bucket = %bucket, key = %key, error = %e, "Firmware download refused");
        ApiError::from(e)
    })?;

    debug!(bucket = %bucket, key = %key, size = data.len(), "Serving firmware");
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], data))
}
