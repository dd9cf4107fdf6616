//! Booking incident report HTTP handlers.
//!
//! - POST /api/v1/reports - Participant files a report against a booking
//! - POST /api/v1/reports/:id/review - Staff takes the report under review
//! - POST /api/v1/reports/:id/resolve - Staff resolves, optionally imposing compensation
//! - POST /api/v1/reports/:id/reject - Staff rejects
//! - POST /api/v1/reports/:id/compensation - Payer submits proof of payment

use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::booking_report::{CompensationPaymentRequest, CreateReportRequest, ReportResponse, ResolveReportRequest},
    services::{image_service, report_service},
    state::AppState,
};

/// File a report against a booking the caller participates in. An optional
/// base64 evidence photo is pushed to the image store first.
pub async fn create_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateReportRequest>,
) -> Result<Json<ReportResponse>, AppError> {
    let image_url = match &request.image {
        Some(encoded) => {
            let bytes = image_service::decode_image(encoded)?;
            Some(state.images.upload("report", bytes).await?)
        }
        None => None,
    };

    let report = report_service::create_report(
        &state.pool,
        auth.user_id,
        request.booking_id,
        &request.title,
        &request.description,
        image_url,
    )
    .await?;

    tracing::info!(report_id = %report.id, booking_id = %request.booking_id, "report filed");

    Ok(Json(report.into()))
}

/// Staff takes a pending report under review.
pub async fn start_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ReportResponse>, AppError> {
    if !auth.role.is_staff() {
        return Err(AppError::Forbidden("staff role required"));
    }

    let report = report_service::start_review(&state.pool, report_id).await?;

    Ok(Json(report.into()))
}

/// Staff resolves a report under review. The compensation fields come as a
/// triple: all present (imposing a payment obligation on one booking party)
/// or all absent.
pub async fn resolve_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(report_id): Path<Uuid>,
    Json(request): Json<ResolveReportRequest>,
) -> Result<Json<ReportResponse>, AppError> {
    if !auth.role.is_staff() {
        return Err(AppError::Forbidden("staff role required"));
    }

    let report = report_service::resolve(
        &state.pool,
        report_id,
        request.compensation_payer_id,
        request.compensation_amount_cents,
        request.compensation_deadline,
    )
    .await?;

    Ok(Json(report.into()))
}

/// Staff rejects a report.
pub async fn reject_report(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(report_id): Path<Uuid>,
) -> Result<Json<ReportResponse>, AppError> {
    if !auth.role.is_staff() {
        return Err(AppError::Forbidden("staff role required"));
    }

    let report = report_service::reject(&state.pool, report_id).await?;

    Ok(Json(report.into()))
}

/// The designated payer submits proof of the compensation payment before
/// the deadline. Missing the deadline gets the account banned by a
/// background sweep.
pub async fn pay_compensation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(report_id): Path<Uuid>,
    Json(request): Json<CompensationPaymentRequest>,
) -> Result<Json<ReportResponse>, AppError> {
    let bytes = image_service::decode_image(&request.proof_image)?;
    let proof_url = state.images.upload("compensation", bytes).await?;

    let report =
        report_service::pay_compensation(&state.pool, auth.user_id, report_id, proof_url).await?;

    Ok(Json(report.into()))
}
