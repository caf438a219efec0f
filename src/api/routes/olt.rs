//! OLT metric endpoints
//!
//! Each request names the OLT in its body; a fresh SNMP session is opened per request.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
};
use crate::olt::{
    OltRequest, OntListResponse, OntRequest, OntStatusResponse, PonPortListResponse,
    SystemMetricsResponse,
};

/// POST /api/v1/olt/system
pub async fn system_metrics(
    State(state): State<ApiState>,
    body: Result<Json<OltRequest>, JsonRejection>,
) -> ApiResult<Json<SystemMetricsResponse>> {
    let Json(request) = body?;
    Ok(Json(state.olt.system_metrics(&request.target).await?))
}

/// POST /api/v1/olt/pon-ports
pub async fn pon_ports(
    State(state): State<ApiState>,
    body: Result<Json<OltRequest>, JsonRejection>,
) -> ApiResult<Json<PonPortListResponse>> {
    let Json(request) = body?;
    Ok(Json(state.olt.pon_ports(&request.target).await?))
}

/// POST /api/v1/olt/onts
///
/// `pon_port` is checked but the full ONT table is returned.
pub async fn onts(
    State(state): State<ApiState>,
    body: Result<Json<OntRequest>, JsonRejection>,
) -> ApiResult<Json<OntListResponse>> {
    let Json(request) = body?;
    validate_pon_port(request.pon_port)?;
    Ok(Json(state.olt.onts(&request.target).await?))
}

/// POST /api/v1/olt/ont-status
pub async fn ont_status(
    State(state): State<ApiState>,
    body: Result<Json<OntRequest>, JsonRejection>,
) -> ApiResult<Json<OntStatusResponse>> {
    let Json(request) = body?;
    validate_pon_port(request.pon_port)?;
    Ok(Json(state.olt.ont_status(&request.target).await?))
}

fn validate_pon_port(pon_port: Option<i64>) -> ApiResult<()> {
    match pon_port {
        Some(port) if port < 0 => Err(ApiError::InvalidRequest(
            "pon_port must be >= 0".to_string(),
        )),
        _ => Ok(()),
    }
}
