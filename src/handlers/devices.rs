//! GPS device fleet HTTP handlers.
//!
//! - POST /api/v1/devices/assign - Bind a device (by hardware id) to a car
//! - POST /api/v1/devices/:id/switch - Rebind a device to another car
//! - POST /api/v1/devices/:id/unassign - Remove a device from its car
//! - PUT /api/v1/devices/:id/maintenance - Take a free device offline
//! - DELETE /api/v1/devices/:id - Soft-delete an unassigned device
//! - GET /api/v1/devices - List the fleet
//!
//! All endpoints require the admin or technician role.

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::gps_device::{AssignDeviceRequest, DeviceResponse, SwitchDeviceRequest},
    services::device_service,
    state::AppState,
};

fn require_device_manager(auth: &AuthContext) -> Result<(), AppError> {
    if !auth.role.can_manage_devices() {
        return Err(AppError::Forbidden("admin or technician role required"));
    }
    Ok(())
}

/// Assign a device to a car, creating the device record on first sight of
/// its hardware id.
pub async fn assign_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<AssignDeviceRequest>,
) -> Result<Json<DeviceResponse>, AppError> {
    require_device_manager(&auth)?;

    let device = device_service::assign_device_to_car(
        &state.pool,
        request.car_id,
        &request.os_build_id,
        &request.device_name,
        request.longitude,
        request.latitude,
    )
    .await?;

    Ok(Json(device.into()))
}

/// Rebind a device to another car.
///
/// If the device was attached to a different car, that car is demoted to
/// `pending`; reassignment is the one operation with this side effect.
pub async fn switch_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(device_id): Path<Uuid>,
    Json(request): Json<SwitchDeviceRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_device_manager(&auth)?;

    device_service::switch_gps_device_for_car(
        &state.pool,
        device_id,
        request.car_id,
        request.longitude,
        request.latitude,
    )
    .await?;

    Ok(Json(serde_json::json!({ "switched": true })))
}

/// Remove a device from its car. Requires an in-progress GPS-change
/// inspection on the car and no open bookings.
pub async fn unassign_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(device_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_device_manager(&auth)?;

    device_service::unassign_gps_device_for_car(&state.pool, device_id).await?;

    Ok(Json(serde_json::json!({ "unassigned": true })))
}

/// Take an unassigned device into maintenance.
pub async fn set_maintenance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(device_id): Path<Uuid>,
) -> Result<Json<DeviceResponse>, AppError> {
    require_device_manager(&auth)?;

    let device = device_service::set_maintenance(&state.pool, device_id).await?;

    Ok(Json(device.into()))
}

/// Soft-delete a device with no active car association.
pub async fn delete_device(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(device_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    require_device_manager(&auth)?;

    device_service::delete_device(&state.pool, device_id).await?;

    Ok(Json(serde_json::json!({ "deleted": true })))
}

/// List the device fleet.
pub async fn list_devices(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<DeviceResponse>>, AppError> {
    require_device_manager(&auth)?;

    let devices = device_service::list_devices(&state.pool).await?;

    Ok(Json(devices.into_iter().map(Into::into).collect()))
}
