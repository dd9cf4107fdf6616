//! Inspection schedule HTTP handlers.
//!
//! - POST /api/v1/inspections - Schedule an inspection for a car
//! - POST /api/v1/inspections/:id/start - Begin the inspection
//! - POST /api/v1/inspections/:id/approve - Conclude with approval
//! - POST /api/v1/inspections/:id/reject - Conclude with rejection
//! - GET /api/v1/cars/:id/inspections - List a car's inspections
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
    models::inspection_schedule::{CreateInspectionRequest, InspectionResponse},
    services::inspection_service,
    state::AppState,
};

fn require_technician(auth: &AuthContext) -> Result<(), AppError> {
    if !auth.role.can_manage_devices() {
        return Err(AppError::Forbidden("admin or technician role required"));
    }
    Ok(())
}

/// Schedule an inspection, assigned to the caller.
pub async fn create_inspection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateInspectionRequest>,
) -> Result<Json<InspectionResponse>, AppError> {
    require_technician(&auth)?;

    let inspection = inspection_service::create_inspection(
        &state.pool,
        auth.user_id,
        request.car_id,
        request.inspection_type,
        request.note,
    )
    .await?;

    Ok(Json(inspection.into()))
}

/// Move a pending inspection to in_progress. While a `change_gps`
/// inspection is in progress, the car's device may be unassigned.
pub async fn start_inspection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(inspection_id): Path<Uuid>,
) -> Result<Json<InspectionResponse>, AppError> {
    require_technician(&auth)?;

    let inspection = inspection_service::start_inspection(&state.pool, inspection_id).await?;

    Ok(Json(inspection.into()))
}

/// Conclude an in-progress inspection with approval.
pub async fn approve_inspection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(inspection_id): Path<Uuid>,
) -> Result<Json<InspectionResponse>, AppError> {
    require_technician(&auth)?;

    let inspection = inspection_service::conclude_inspection(&state.pool, inspection_id, true).await?;

    Ok(Json(inspection.into()))
}

/// Conclude an in-progress inspection with rejection.
pub async fn reject_inspection(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(inspection_id): Path<Uuid>,
) -> Result<Json<InspectionResponse>, AppError> {
    require_technician(&auth)?;

    let inspection = inspection_service::conclude_inspection(&state.pool, inspection_id, false).await?;

    Ok(Json(inspection.into()))
}

/// List all inspections recorded against a car.
pub async fn list_car_inspections(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(car_id): Path<Uuid>,
) -> Result<Json<Vec<InspectionResponse>>, AppError> {
    require_technician(&auth)?;

    let inspections = inspection_service::list_for_car(&state.pool, car_id).await?;

    Ok(Json(inspections.into_iter().map(Into::into).collect()))
}
