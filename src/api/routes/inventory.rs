//! Inventory sync endpoint

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use tracing::info;

use crate::api::{
    error::ApiResult,
    state::ApiState,
    types::{SyncRequest, SyncResponse},
};

/// POST /api/v1/monitoring/sync
///
/// Replaces the whole inventory. Rejected as a unit when two devices share an IP,
/// and answered with 502 when the inventory cannot reach the scheduler's store.
pub async fn sync_devices(
    State(state): State<ApiState>,
    body: Result<Json<SyncRequest>, JsonRejection>,
) -> ApiResult<Json<SyncResponse>> {
    let Json(request) = body?;

    let count = state.devices.sync(request.devices).await?;
    info!("inventory synced: {count} devices");

    Ok(Json(SyncResponse { count }))
}
